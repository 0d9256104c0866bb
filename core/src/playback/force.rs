use crate::math::stats::StatsHelper;
use crate::prelude::ForceSource;

/// Level at which the wind reaches its maximum.
pub const LEVEL_CEILING: f32 = 0.1;
/// Peak horizontal wind, in surface units per frame squared.
pub const MAX_WIND: f32 = 0.05;

/// Wind driven by an audio level: silence blows left, loud input right.
#[derive(Debug, Clone, Default)]
pub struct AudioLevelWind {
    level: f32,
}

impl AudioLevelWind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the level from a buffer of samples (RMS).
    pub fn feed(&mut self, samples: &[f32]) {
        self.level = StatsHelper::rms(samples);
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = level.max(0.0);
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}

impl ForceSource for AudioLevelWind {
    fn wind(&mut self) -> f32 {
        StatsHelper::map_range(
            f64::from(self.level),
            0.0,
            f64::from(LEVEL_CEILING),
            f64::from(-MAX_WIND),
            f64::from(MAX_WIND),
        ) as f32
    }
}

/// Fixed wind, mostly for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantWind(pub f32);

impl ForceSource for ConstantWind {
    fn wind(&mut self) -> f32 {
        self.0
    }
}
