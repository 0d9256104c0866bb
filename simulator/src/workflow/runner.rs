use crate::generator::template::SyntheticMic;
use crate::gui_bridge::bridge::GuiBridge;
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use smokecore::playback::{AudioLevelWind, ConstantWind, PlaybackCommand};
use smokecore::prelude::ForceSource;
use smokecore::telemetry::log::format_timestamp;
use smokecore::telemetry::MetricsSnapshot;
use smokecore::PlaybackSession;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct WorkflowResult {
    pub frames: usize,
    pub records: usize,
    pub peak_emitters: usize,
    pub peak_particles: usize,
    pub final_time: Option<i64>,
    pub metrics: MetricsSnapshot,
}

/// Synthetic microphone feeding an audio-level wind, one buffer per frame.
#[derive(Default)]
pub struct MicWind {
    mic: SyntheticMic,
    wind: AudioLevelWind,
}

impl MicWind {
    pub fn level(&self) -> f32 {
        self.wind.level()
    }
}

impl ForceSource for MicWind {
    fn wind(&mut self) -> f32 {
        self.wind.feed(&self.mic.next_buffer());
        self.wind.wind()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn build_session(&self) -> anyhow::Result<PlaybackSession> {
        PlaybackSession::new(self.config.engine.clone()).context("creating playback session")
    }

    /// Force for offline runs: the configured fixed wind, or the synthetic
    /// microphone when none is set.
    pub fn force_source(&self) -> Box<dyn ForceSource> {
        match self.config.wind {
            Some(wind) => Box::new(ConstantWind(wind)),
            None => Box::new(MicWind::default()),
        }
    }

    /// Runs `frames` frames back to back with a fixed delta.
    pub fn execute(&self, session: &mut PlaybackSession, frames: usize) -> WorkflowResult {
        let delta = self.config.frame_interval_ms as f64;
        let mut force = self.force_source();
        let mut peak_emitters = 0;
        let mut peak_particles = 0;

        for _ in 0..frames {
            let report = session.advance(delta, force.wind());
            peak_emitters = peak_emitters.max(session.pool().len());
            peak_particles = peak_particles.max(report.particles);
        }

        WorkflowResult {
            frames,
            records: session.store().len(),
            peak_emitters,
            peak_particles,
            final_time: session.clock().current_time(),
            metrics: session.metrics(),
        }
    }

    /// Real-time frame loop: applies queued controls, advances by measured
    /// wall time and publishes each frame to the bridge. Runs until the
    /// control channel closes.
    pub async fn run_realtime(
        &self,
        session: &mut PlaybackSession,
        bridge: &GuiBridge,
        mut controls: mpsc::UnboundedReceiver<PlaybackCommand>,
    ) -> anyhow::Result<()> {
        let interval = Duration::from_millis(self.config.frame_interval_ms.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut mic = MicWind::default();
        let mut last = Instant::now();

        loop {
            ticker.tick().await;
            loop {
                match controls.try_recv() {
                    Ok(command) => session.apply(command),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => return Ok(()),
                }
            }

            let now = Instant::now();
            let delta = now.duration_since(last).as_secs_f64() * 1000.0;
            last = now;

            let wind = mic.wind();
            session.advance(delta, wind);

            let snapshot = session.snapshot();
            let status = match snapshot.playback_time {
                Some(time) if snapshot.paused => format!("Paused at {}", format_timestamp(time)),
                Some(time) => format!("Playing {}", format_timestamp(time)),
                None => "Waiting for calls...".to_string(),
            };
            bridge.publish(VisualizationModel {
                snapshot,
                status,
                mic_level: mic.level(),
                metrics: session.metrics(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::build_calls;
    use smokecore::playback::BatchSource;

    #[test]
    fn runner_executes_workflow() {
        let cfg = WorkflowConfig::from_args(240, 2000.0, 10, Some(4));
        let runner = Runner::new(cfg.clone());
        let mut session = runner.build_session().unwrap();
        let calls = build_calls(&cfg.generator).unwrap();
        session.inbox().submit(BatchSource::Synthetic, calls).unwrap();

        let result = runner.execute(&mut session, cfg.frames);
        assert_eq!(result.frames, 240);
        assert_eq!(result.records, 200);
        assert!(result.peak_emitters <= 10);
        assert!(result.peak_emitters > 0);
        assert!(result.peak_particles <= 10 * cfg.engine.max_particles_per_emitter);
        assert_eq!(result.metrics.frames, 240);
        assert!(result.metrics.spawned > 0);
    }

    #[test]
    fn runner_handles_empty_feed() {
        let cfg = WorkflowConfig::from_args(30, 300.0, 10, Some(1));
        let runner = Runner::new(cfg);
        let mut session = runner.build_session().unwrap();
        session.inbox().submit(BatchSource::Synthetic, Vec::new()).unwrap();
        let result = runner.execute(&mut session, 30);
        assert_eq!(result.records, 0);
        assert_eq!(result.peak_emitters, 0);
    }

    #[test]
    fn fixed_wind_drives_offline_run() {
        let cfg = WorkflowConfig {
            wind: Some(0.03),
            ..WorkflowConfig::from_args(10, 300.0, 10, Some(5))
        };
        let runner = Runner::new(cfg);
        let mut force = runner.force_source();
        assert_eq!(force.wind(), 0.03);

        let mut session = runner.build_session().unwrap();
        runner.execute(&mut session, 3);
        assert_eq!(session.snapshot().wind, 0.03);
    }

    #[test]
    fn mic_wind_stays_in_range() {
        let mut mic = MicWind::default();
        for _ in 0..100 {
            let wind = mic.wind();
            assert!(wind.abs() <= 0.05 + 1e-6);
            assert!(mic.level() >= 0.0);
        }
    }

    #[tokio::test]
    async fn realtime_loop_publishes_frames() {
        let cfg = WorkflowConfig {
            frame_interval_ms: 1,
            ..WorkflowConfig::from_args(0, 300.0, 10, Some(2))
        };
        let runner = Runner::new(cfg.clone());
        let mut session = runner.build_session().unwrap();
        session
            .inbox()
            .submit(BatchSource::Synthetic, build_calls(&cfg.generator).unwrap())
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = GuiBridge::new(session.inbox(), tx.clone());

        tx.send(PlaybackCommand::Pause).unwrap();
        // The bridge keeps a sender alive, so the loop only ends on timeout.
        let run = tokio::time::timeout(
            Duration::from_millis(200),
            runner.run_realtime(&mut session, &bridge, rx),
        )
        .await;
        assert!(run.is_err());
        let model = bridge.snapshot();
        assert!(model.snapshot.paused);
        assert!(model.snapshot.frame > 0);
        assert_eq!(model.snapshot.record_count, 200);
        assert!(model.mic_level.is_finite());
    }
}
