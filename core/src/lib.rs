//! Playback and particle engine for the SF 911 smoke visualization.
//!
//! Dispatch calls are normalized into an ordered event store, replayed by a
//! virtual clock, and turned into short-lived smoke emitters whose particles
//! a renderer draws each frame.

pub mod dispatch;
pub mod math;
pub mod playback;
pub mod prelude;
pub mod telemetry;

pub use playback::{FrameSnapshot, PlaybackCommand, PlaybackSession};
pub use prelude::{EngineConfig, EngineError, ForceSource};
