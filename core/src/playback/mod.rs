pub mod clock;
pub mod emitter;
pub mod event_store;
pub mod force;
pub mod particle;
pub mod session;
pub mod sprite;

pub use clock::{ClockTick, PlaybackClock};
pub use emitter::{Emitter, EmitterPool, SpawnOutcome, StepReport};
pub use event_store::{EventStore, IngestSummary};
pub use force::{AudioLevelWind, ConstantWind};
pub use particle::Particle;
pub use session::{
    BatchSender, BatchSource, FrameReport, FrameSnapshot, LegendEntry, PlaybackCommand,
    PlaybackSession, RecordBatch,
};
pub use sprite::ParticleSprite;
