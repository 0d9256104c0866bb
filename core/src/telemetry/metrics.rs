use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Running totals for a playback session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub spawned: u64,
    pub evicted: u64,
    pub rejected: u64,
    pub retired: u64,
    pub loops: u64,
    pub batches: u64,
    pub stale_batches: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_frame(&self) {
        self.update(|m| m.frames += 1);
    }

    pub fn record_spawn(&self, evicted: usize) {
        self.update(|m| {
            m.spawned += 1;
            m.evicted += evicted as u64;
        });
    }

    pub fn record_rejected(&self) {
        self.update(|m| m.rejected += 1);
    }

    pub fn record_retired(&self, count: usize) {
        self.update(|m| m.retired += count as u64);
    }

    pub fn record_loop(&self) {
        self.update(|m| m.loops += 1);
    }

    pub fn record_batch(&self) {
        self.update(|m| m.batches += 1);
    }

    pub fn record_stale_batch(&self) {
        self.update(|m| m.stale_batches += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_frame();
        metrics.record_spawn(2);
        metrics.record_spawn(0);
        metrics.record_retired(3);
        let snap = metrics.snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.spawned, 2);
        assert_eq!(snap.evicted, 2);
        assert_eq!(snap.retired, 3);
    }
}
