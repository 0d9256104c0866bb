use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::dispatch::{color_for_call_type, RawDispatchCall, Rgb};
use crate::math::projection::SF_BOUNDS;
use crate::math::vector::Vec2;
use crate::playback::clock::{ClockTick, PlaybackClock};
use crate::playback::emitter::{EmitterPool, SpawnOutcome};
use crate::playback::event_store::{EventStore, IngestSummary};
use crate::playback::sprite::ParticleSprite;
use crate::prelude::{EngineConfig, EngineError, EngineResult, TimestampMs};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};

/// Where a batch of calls came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    Live,
    Synthetic,
    Manual,
}

/// A full replacement record set, tagged with the generation reserved when
/// it was requested.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub generation: u64,
    pub source: BatchSource,
    pub calls: Vec<RawDispatchCall>,
}

/// Producer side of a session's inbox.
#[derive(Debug, Clone)]
pub struct BatchSender {
    tx: mpsc::UnboundedSender<RecordBatch>,
    generations: Arc<AtomicU64>,
}

impl BatchSender {
    /// Reserves the next generation. Reserve when a request starts so a
    /// slower, older request can never overwrite a newer one.
    pub fn reserve(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn send(&self, batch: RecordBatch) -> EngineResult<()> {
        self.tx.send(batch).map_err(|_| EngineError::InboxClosed)
    }

    /// Reserves a generation and sends in one go.
    pub fn submit(&self, source: BatchSource, calls: Vec<RawDispatchCall>) -> EngineResult<u64> {
        let generation = self.reserve();
        self.send(RecordBatch {
            generation,
            source,
            calls,
        })?;
        Ok(generation)
    }
}

/// Playback controls accepted between frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum PlaybackCommand {
    TogglePause,
    Pause,
    Resume,
    SpeedUp,
    SlowDown,
    SetSpeed(f64),
    ScrubTo(f64),
    Reset,
    /// New drawing surface; applies to emitters spawned afterwards.
    Resize { width: f32, height: f32 },
}

/// What happened during one `advance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub tick: ClockTick,
    pub activated: usize,
    pub spawned: usize,
    pub evicted: usize,
    pub rejected: usize,
    pub completed: usize,
    pub retired: usize,
    pub particles: usize,
}

impl FrameReport {
    fn new(tick: ClockTick) -> Self {
        Self {
            tick,
            activated: 0,
            spawned: 0,
            evicted: 0,
            rejected: 0,
            completed: 0,
            retired: 0,
            particles: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub code: String,
    pub label: String,
    pub color: Rgb,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub playback_time: Option<TimestampMs>,
    pub window_start: TimestampMs,
    pub window_end: TimestampMs,
    pub progress: Option<f64>,
    pub speed: f64,
    pub paused: bool,
    pub record_count: usize,
    pub active_emitters: usize,
    /// Horizontal force applied on the last frame.
    pub wind: f32,
    pub surface_width: f32,
    pub surface_height: f32,
    pub sprites: Vec<ParticleSprite>,
    pub legend: Vec<LegendEntry>,
}

/// Owns all playback state; driven by a single frame loop.
pub struct PlaybackSession {
    config: EngineConfig,
    store: EventStore,
    clock: PlaybackClock,
    pool: EmitterPool,
    inbox_tx: BatchSender,
    inbox_rx: mpsc::UnboundedReceiver<RecordBatch>,
    applied_generation: u64,
    frame: u64,
    wind: f32,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl PlaybackSession {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let store = EventStore::new(SF_BOUNDS);
        let (start, end) = store.window();
        let clock = PlaybackClock::new(start, end, config.playback_speed);
        let pool = EmitterPool::new(config.clone(), SF_BOUNDS);
        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            store,
            clock,
            pool,
            inbox_tx: BatchSender {
                tx,
                generations: Arc::new(AtomicU64::new(0)),
            },
            inbox_rx: rx,
            applied_generation: 0,
            frame: 0,
            wind: 0.0,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new(),
        })
    }

    pub fn inbox(&self) -> BatchSender {
        self.inbox_tx.clone()
    }

    /// Swaps in a new record set. Returns `None` when the batch is older
    /// than one already applied.
    pub fn load(&mut self, batch: RecordBatch) -> Option<IngestSummary> {
        if batch.generation <= self.applied_generation {
            self.logger
                .stale_batch(batch.generation, self.applied_generation);
            self.metrics.record_stale_batch();
            return None;
        }

        let summary = self.store.ingest_raw(&batch.calls);
        self.logger.ingest(batch.generation, &summary);
        let (start, end) = self.store.window();
        self.clock.set_window(start, end);
        self.pool.clear();
        self.applied_generation = batch.generation;
        self.metrics.record_batch();
        Some(summary)
    }

    /// Applies only the newest queued batch; older queued ones are stale.
    fn drain_inbox(&mut self) {
        let mut newest: Option<RecordBatch> = None;
        while let Ok(batch) = self.inbox_rx.try_recv() {
            let is_newer = newest
                .as_ref()
                .map_or(true, |current| batch.generation > current.generation);
            let (kept, dropped) = if is_newer {
                let generation = batch.generation;
                (generation, newest.replace(batch))
            } else {
                let kept = newest.as_ref().map_or(0, |current| current.generation);
                (kept, Some(batch))
            };
            if let Some(dropped) = dropped {
                self.logger.stale_batch(dropped.generation, kept);
                self.metrics.record_stale_batch();
            }
        }
        if let Some(batch) = newest {
            self.load(batch);
        }
    }

    /// Runs one frame: pending batch swap, clock tick, activation, spawn,
    /// completion and particle step under a horizontal `wind`.
    pub fn advance(&mut self, delta_real_ms: f64, wind: f32) -> FrameReport {
        self.drain_inbox();

        let tick = self.clock.tick(delta_real_ms);
        let mut report = FrameReport::new(tick);
        self.frame += 1;
        self.wind = wind;
        self.metrics.record_frame();

        if tick.is_loop() {
            self.restart_playback();
            self.metrics.record_loop();
            self.logger.record("playback window finished, looping");
            return report;
        }

        let now = tick.time();
        for record in self.store.activate_due(now) {
            report.activated += 1;
            match self.pool.spawn(record) {
                SpawnOutcome::Spawned { evicted } => {
                    report.spawned += 1;
                    report.evicted += evicted;
                    self.metrics.record_spawn(evicted);
                }
                SpawnOutcome::Rejected => {
                    report.rejected += 1;
                    self.metrics.record_rejected();
                }
            }
        }

        report.completed = self.store.mark_completed_due(now);
        let step = self.pool.step(Vec2::new(wind, 0.0), &self.store);
        report.retired = step.retired;
        report.particles = step.particles;
        self.metrics.record_retired(step.retired);

        self.logger
            .status(self.frame, self.pool.len(), step.particles, now);
        report
    }

    pub fn apply(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::TogglePause => self.clock.toggle_pause(),
            PlaybackCommand::Pause => self.clock.pause(),
            PlaybackCommand::Resume => self.clock.resume(),
            PlaybackCommand::SpeedUp => {
                self.clock.speed_up();
            }
            PlaybackCommand::SlowDown => {
                self.clock.slow_down();
            }
            PlaybackCommand::SetSpeed(speed) => {
                self.clock.set_speed(speed);
            }
            PlaybackCommand::ScrubTo(fraction) => {
                let time = self.clock.scrub_to(fraction);
                self.restart_playback();
                self.logger.record(&format!(
                    "scrubbed to {}",
                    crate::telemetry::log::format_timestamp(time)
                ));
            }
            PlaybackCommand::Reset => {
                self.clock.rewind();
                self.restart_playback();
                self.logger.record("playback reset");
            }
            PlaybackCommand::Resize { width, height } => {
                if let Err(err) = self.resize(width, height) {
                    log::warn!("resize ignored: {}", err);
                }
            }
        }
    }

    /// Loop and scrub coupling: no emitters survive and every record may
    /// activate again.
    fn restart_playback(&mut self) {
        self.pool.clear();
        self.store.reset();
    }

    /// New surface size; applies to emitters spawned from now on.
    pub fn resize(&mut self, width: f32, height: f32) -> EngineResult<()> {
        if !(width > 0.0 && height > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "surface must be positive, got {}x{}",
                width, height
            )));
        }
        self.config.surface_width = width;
        self.config.surface_height = height;
        self.pool.set_surface(width, height);
        Ok(())
    }

    pub fn sprites(&self) -> Vec<ParticleSprite> {
        self.pool.sprites()
    }

    /// Call types of the live emitters, first appearance first.
    pub fn legend(&self) -> Vec<LegendEntry> {
        let mut legend: Vec<LegendEntry> = Vec::new();
        for emitter in self.pool.emitters() {
            let code = emitter.call_type_code();
            if legend.iter().any(|entry| entry.code == code) {
                continue;
            }
            legend.push(LegendEntry {
                code: code.to_string(),
                label: self.store.catalog().label(code).to_string(),
                color: color_for_call_type(code),
            });
        }
        legend
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let (window_start, window_end) = self.clock.window();
        FrameSnapshot {
            frame: self.frame,
            playback_time: self.clock.current_time(),
            window_start,
            window_end,
            progress: self.clock.progress(),
            speed: self.clock.running_speed(),
            paused: self.clock.is_paused(),
            record_count: self.store.len(),
            active_emitters: self.pool.len(),
            wind: self.wind,
            surface_width: self.config.surface_width,
            surface_height: self.config.surface_height,
            sprites: self.sprites(),
            legend: self.legend(),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn pool(&self) -> &EmitterPool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}
