use log::{debug, info, warn};

use crate::playback::event_store::IngestSummary;
use crate::prelude::TimestampMs;

/// Frames between periodic status lines.
pub const STATUS_INTERVAL: u64 = 60;

pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn ingest(&self, generation: u64, summary: &IngestSummary) {
        if summary.fallback_window {
            warn!(
                "batch {} had no usable calls ({} rejected, {} out of bounds); using empty 24h window",
                generation, summary.rejected, summary.out_of_bounds
            );
        } else {
            info!(
                "batch {} ingested: {} calls ({} rejected, {} out of bounds, {} duplicates)",
                generation,
                summary.accepted,
                summary.rejected,
                summary.out_of_bounds,
                summary.duplicates
            );
        }
    }

    pub fn stale_batch(&self, generation: u64, latest: u64) {
        debug!("ignoring batch {} (already applied {})", generation, latest);
    }

    /// Emits a status line every `STATUS_INTERVAL` frames.
    pub fn status(&self, frame: u64, emitters: usize, particles: usize, time: TimestampMs) {
        if frame % STATUS_INTERVAL == 0 {
            info!(
                "frame {}: {} emitters, {} particles, playback {}",
                frame,
                emitters,
                particles,
                format_timestamp(time)
            );
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, or the raw number when out of range.
pub fn format_timestamp(time: TimestampMs) -> String {
    chrono::DateTime::from_timestamp_millis(time)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| time.to_string())
}
