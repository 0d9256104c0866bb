use anyhow::Context;
use serde::{Deserialize, Serialize};
use smokecore::prelude::{EngineConfig, EngineResult};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::feed::FeedConfig;
use crate::generator::profile::GeneratorConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub engine: EngineConfig,
    pub generator: GeneratorConfig,
    pub feed: FeedConfig,
    /// Frames simulated by an offline run.
    pub frames: usize,
    /// Real time between frames; also the delta an offline run assumes.
    pub frame_interval_ms: u64,
    pub bridge_addr: SocketAddr,
    /// Fixed wind for offline runs; unset uses the synthetic microphone.
    pub wind: Option<f32>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            generator: GeneratorConfig::default(),
            feed: FeedConfig::default(),
            frames: 600,
            frame_interval_ms: 16,
            bridge_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            wind: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(frames: usize, speed: f64, max_emitters: usize, seed: Option<u64>) -> Self {
        let defaults = Self::default();
        Self {
            engine: EngineConfig {
                playback_speed: speed,
                max_emitters,
                seed,
                ..defaults.engine
            },
            generator: GeneratorConfig {
                seed: seed.unwrap_or(defaults.generator.seed),
                ..defaults.generator
            },
            frames,
            ..defaults
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokecore::prelude::RetirementPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_produces_engine_config() {
        let cfg = WorkflowConfig::from_args(120, 600.0, 12, Some(9));
        assert_eq!(cfg.engine.max_emitters, 12);
        assert_eq!(cfg.engine.playback_speed, 600.0);
        assert_eq!(cfg.generator.seed, 9);
        assert_eq!(cfg.frames, 120);
        cfg.validate().unwrap();
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"frames: 30\nengine:\n  max_emitters: 8\n  retirement: either\n  spawn_rate: { a: 3, b: 2, c: 1 }\nfeed:\n  live: false\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.frames, 30);
        assert_eq!(cfg.engine.max_emitters, 8);
        assert_eq!(cfg.engine.retirement, RetirementPolicy::Either);
        assert_eq!(cfg.engine.spawn_rate.a, 3);
        assert_eq!(cfg.engine.lifespan_frames.a, 180);
        assert_eq!(cfg.generator.count, 200);
        assert_eq!(cfg.wind, None);
    }

    #[test]
    fn config_load_reads_fixed_wind() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"wind: -0.02\n").unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.wind, Some(-0.02));
    }

    #[test]
    fn config_load_reports_missing_file() {
        let err = WorkflowConfig::load("/nonexistent/workflow.yaml").unwrap_err();
        assert!(err.to_string().contains("reading workflow config"));
    }
}
