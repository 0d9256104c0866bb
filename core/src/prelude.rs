use serde::{Deserialize, Serialize};

use crate::dispatch::Priority;

/// Timestamps are milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// What happens when a spawn is requested while the pool is full.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the oldest emitters (spawn order) to make room.
    #[default]
    EvictOldest,
    /// Ignore the new spawn.
    RejectNew,
}

/// When an emitter is retired from the pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetirementPolicy {
    /// Retire once age exceeds the priority lifespan.
    #[default]
    Lifespan,
    /// Retire once the source record reaches its on-scene time.
    OnScene,
    /// Retire on whichever of the two happens first.
    Either,
}

/// Per-priority tunable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityTable {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl PriorityTable {
    pub fn get(&self, priority: Priority) -> u32 {
        match priority {
            Priority::A => self.a,
            Priority::B => self.b,
            Priority::C => self.c,
        }
    }
}

/// Shared configuration for the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_emitters: usize,
    pub max_particles_per_emitter: usize,
    pub lifespan_frames: PriorityTable,
    pub spawn_rate: PriorityTable,
    pub overflow: OverflowPolicy,
    pub retirement: RetirementPolicy,
    pub playback_speed: f64,
    pub surface_width: f32,
    pub surface_height: f32,
    pub texture_size: f32,
    /// Seed for particle randomness; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_emitters: 40,
            max_particles_per_emitter: 50,
            lifespan_frames: PriorityTable {
                a: 180,
                b: 150,
                c: 120,
            },
            spawn_rate: PriorityTable { a: 2, b: 1, c: 1 },
            overflow: OverflowPolicy::default(),
            retirement: RetirementPolicy::default(),
            playback_speed: crate::playback::clock::DEFAULT_SPEED,
            surface_width: 1280.0,
            surface_height: 800.0,
            texture_size: 64.0,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        use crate::playback::clock::{MAX_SPEED, MIN_SPEED};

        if !(self.surface_width > 0.0 && self.surface_height > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "surface must be positive, got {}x{}",
                self.surface_width, self.surface_height
            )));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.playback_speed) {
            return Err(EngineError::InvalidConfig(format!(
                "playback speed {} outside [{}, {}]",
                self.playback_speed, MIN_SPEED, MAX_SPEED
            )));
        }
        if self.texture_size < 0.0 {
            return Err(EngineError::InvalidConfig("texture size is negative".into()));
        }
        Ok(())
    }
}

/// Common error type for engine setup and plumbing.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("record inbox closed")]
    InboxClosed,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Source of the horizontal environmental force applied to every particle.
pub trait ForceSource {
    /// Wind for the coming frame, roughly in [-1, 1].
    fn wind(&mut self) -> f32;
}
