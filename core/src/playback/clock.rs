use crate::prelude::TimestampMs;

pub const DEFAULT_SPEED: f64 = 300.0;
pub const MIN_SPEED: f64 = 10.0;
pub const MAX_SPEED: f64 = 2000.0;
pub const SPEED_STEP_UP: f64 = 1.5;
pub const SPEED_STEP_DOWN: f64 = 0.75;

/// Result of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockTick {
    /// First tick after construction, a window change or a loop.
    Started(TimestampMs),
    Advanced(TimestampMs),
    /// The window end was reached. The caller must clear the emitter pool
    /// and reset the event store; the next tick restarts at window start.
    Looped(TimestampMs),
}

impl ClockTick {
    pub fn time(self) -> TimestampMs {
        match self {
            ClockTick::Started(t) | ClockTick::Advanced(t) | ClockTick::Looped(t) => t,
        }
    }

    pub fn is_loop(self) -> bool {
        matches!(self, ClockTick::Looped(_))
    }
}

/// Virtual playback clock cycling over `[window_start, window_end]`.
///
/// `speed` is simulated milliseconds per real millisecond; zero means
/// paused, with the last running speed kept in `stored_speed`.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    current: Option<f64>,
    speed: f64,
    stored_speed: f64,
    window_start: TimestampMs,
    window_end: TimestampMs,
}

impl PlaybackClock {
    pub fn new(window_start: TimestampMs, window_end: TimestampMs, speed: f64) -> Self {
        let speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        Self {
            current: None,
            speed,
            stored_speed: speed,
            window_start,
            window_end: window_end.max(window_start),
        }
    }

    /// Advances by `delta_real_ms * speed`. Reaching the window end loops
    /// without an activation pass at the end time, so records received at
    /// exactly `window_end` are never replayed.
    pub fn tick(&mut self, delta_real_ms: f64) -> ClockTick {
        let Some(current) = self.current else {
            self.current = Some(self.window_start as f64);
            return ClockTick::Started(self.window_start);
        };
        if self.is_paused() {
            return ClockTick::Advanced(current as TimestampMs);
        }

        let next = current + delta_real_ms.max(0.0) * self.speed;
        if next >= self.window_end as f64 {
            self.current = None;
            return ClockTick::Looped(self.window_end);
        }
        self.current = Some(next);
        ClockTick::Advanced(next as TimestampMs)
    }

    /// Jumps to a fraction of the window. The caller must clear emitters
    /// and reset activation flags.
    pub fn scrub_to(&mut self, fraction: f64) -> TimestampMs {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let span = (self.window_end - self.window_start) as f64;
        let target = self.window_start as f64 + fraction * span;
        self.current = Some(target);
        target as TimestampMs
    }

    /// Back to window start, as a manual reset.
    pub fn rewind(&mut self) {
        self.current = Some(self.window_start as f64);
    }

    /// New window; playback restarts on the next tick.
    pub fn set_window(&mut self, window_start: TimestampMs, window_end: TimestampMs) {
        self.window_start = window_start;
        self.window_end = window_end.max(window_start);
        self.current = None;
    }

    pub fn pause(&mut self) {
        if self.speed > 0.0 {
            self.stored_speed = self.speed;
            self.speed = 0.0;
        }
    }

    pub fn resume(&mut self) {
        if self.speed == 0.0 {
            self.speed = if self.stored_speed > 0.0 {
                self.stored_speed
            } else {
                DEFAULT_SPEED
            };
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.is_paused() {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Clamps to `[MIN_SPEED, MAX_SPEED]`. While paused only the speed
    /// restored by `resume` changes.
    pub fn set_speed(&mut self, multiplier: f64) -> f64 {
        let clamped = if multiplier.is_nan() {
            DEFAULT_SPEED
        } else {
            multiplier.clamp(MIN_SPEED, MAX_SPEED)
        };
        self.stored_speed = clamped;
        if !self.is_paused() {
            self.speed = clamped;
        }
        clamped
    }

    pub fn speed_up(&mut self) -> f64 {
        self.set_speed(self.running_speed() * SPEED_STEP_UP)
    }

    pub fn slow_down(&mut self) -> f64 {
        self.set_speed(self.running_speed() * SPEED_STEP_DOWN)
    }

    pub fn is_paused(&self) -> bool {
        self.speed == 0.0
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Speed in effect once unpaused.
    pub fn running_speed(&self) -> f64 {
        if self.is_paused() {
            self.stored_speed
        } else {
            self.speed
        }
    }

    pub fn current_time(&self) -> Option<TimestampMs> {
        self.current.map(|t| t as TimestampMs)
    }

    pub fn window(&self) -> (TimestampMs, TimestampMs) {
        (self.window_start, self.window_end)
    }

    /// Position within the window in `[0, 1]`, once started.
    pub fn progress(&self) -> Option<f64> {
        let current = self.current?;
        let span = (self.window_end - self.window_start) as f64;
        if span <= 0.0 {
            return Some(0.0);
        }
        Some(((current - self.window_start as f64) / span).clamp(0.0, 1.0))
    }
}
