use serde::{Deserialize, Serialize};
use smokecore::telemetry::MetricsSnapshot;
use smokecore::FrameSnapshot;

/// Payload served to the visualizer on `GET /frame`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    #[serde(flatten)]
    pub snapshot: FrameSnapshot,
    pub status: String,
    /// RMS level of the (synthetic) microphone feeding the wind.
    pub mic_level: f32,
    pub metrics: MetricsSnapshot,
}
