use std::collections::HashMap;

use crate::dispatch::{CallTypeCatalog, DispatchRecord, RawDispatchCall, RecordRejection};
use crate::math::projection::{GeoBounds, SF_BOUNDS};
use crate::prelude::TimestampMs;

/// Width of the playback window used when no record survives ingestion.
pub const FALLBACK_WINDOW_MS: TimestampMs = 24 * 60 * 60 * 1000;

/// Counts from one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub out_of_bounds: usize,
    pub duplicates: usize,
    /// True when nothing survived and the synthetic window is in use.
    pub fallback_window: bool,
}

/// Ordered dispatch records plus their activation bookkeeping.
///
/// Records are sorted by `received_time`. Activation always proceeds in that
/// order, so the activated records form a prefix tracked by `next_due`.
#[derive(Debug, Clone)]
pub struct EventStore {
    records: Vec<DispatchRecord>,
    index: HashMap<String, usize>,
    catalog: CallTypeCatalog,
    bounds: GeoBounds,
    oldest: TimestampMs,
    newest: TimestampMs,
    next_due: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(SF_BOUNDS)
    }
}

impl EventStore {
    /// Empty store with the fallback window ending now.
    pub fn new(bounds: GeoBounds) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            catalog: CallTypeCatalog::default(),
            bounds,
            oldest: now - FALLBACK_WINDOW_MS,
            newest: now,
            next_due: 0,
        }
    }

    /// Normalizes raw feed rows and ingests the ones that survive.
    pub fn ingest_raw(&mut self, calls: &[RawDispatchCall]) -> IngestSummary {
        let now = chrono::Utc::now().timestamp_millis();
        self.ingest_raw_at(calls, now)
    }

    pub fn ingest_raw_at(&mut self, calls: &[RawDispatchCall], now: TimestampMs) -> IngestSummary {
        let mut rejected = 0;
        let records = calls
            .iter()
            .filter_map(|call| match call.normalize() {
                Ok(record) => Some(record),
                Err(reason) => {
                    log_rejection(call, &reason);
                    rejected += 1;
                    None
                }
            })
            .collect();
        let mut summary = self.ingest_at(records, now);
        summary.rejected += rejected;
        summary
    }

    /// Replaces the store contents with the in-bounds records, sorted by
    /// received time. Clears every flag.
    pub fn ingest(&mut self, records: Vec<DispatchRecord>) -> IngestSummary {
        let now = chrono::Utc::now().timestamp_millis();
        self.ingest_at(records, now)
    }

    /// [`EventStore::ingest`] with an explicit "now" for the fallback window.
    pub fn ingest_at(&mut self, records: Vec<DispatchRecord>, now: TimestampMs) -> IngestSummary {
        let mut summary = IngestSummary::default();
        let bounds = self.bounds;

        let mut kept: Vec<DispatchRecord> = records
            .into_iter()
            .filter(|record| {
                let inside = bounds.contains(record.location.lon, record.location.lat);
                if !inside {
                    summary.out_of_bounds += 1;
                }
                inside
            })
            .collect();

        // Stable, so equal timestamps keep feed order.
        kept.sort_by_key(|record| record.received_time);

        self.records.clear();
        self.index.clear();
        self.catalog.clear();
        for mut record in kept {
            if self.index.contains_key(&record.id) {
                summary.duplicates += 1;
                continue;
            }
            record.set_activated(false);
            record.set_completed(false);
            self.catalog
                .insert(&record.call_type_code, &record.call_type_label);
            self.index.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
        self.next_due = 0;

        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => {
                self.oldest = first.received_time;
                self.newest = last.received_time;
            }
            _ => {
                self.oldest = now - FALLBACK_WINDOW_MS;
                self.newest = now;
                summary.fallback_window = true;
            }
        }

        summary.accepted = self.records.len();
        summary
    }

    /// Records with `received_time <= now` not yet activated, in order.
    /// Each is marked activated and will not be yielded again until reset.
    pub fn activate_due(&mut self, now: TimestampMs) -> &[DispatchRecord] {
        let start = self.next_due;
        let end = start
            + self.records[start..].partition_point(|record| record.received_time <= now);
        for record in &mut self.records[start..end] {
            record.set_activated(true);
        }
        self.next_due = end;
        &self.records[start..end]
    }

    /// Flags every record whose on-scene time has passed. Returns how many
    /// were newly completed.
    pub fn mark_completed_due(&mut self, now: TimestampMs) -> usize {
        let mut newly = 0;
        for record in self
            .records
            .iter_mut()
            .filter(|record| !record.is_completed() && record.on_scene_time <= now)
        {
            record.set_completed(true);
            newly += 1;
        }
        newly
    }

    /// Clears activation and completion flags; order and contents stay.
    pub fn reset(&mut self) {
        for record in &mut self.records {
            record.set_activated(false);
            record.set_completed(false);
        }
        self.next_due = 0;
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.index
            .get(id)
            .and_then(|&idx| self.records.get(idx))
            .is_some_and(DispatchRecord::is_completed)
    }

    pub fn window(&self) -> (TimestampMs, TimestampMs) {
        (self.oldest, self.newest)
    }

    pub fn records(&self) -> &[DispatchRecord] {
        &self.records
    }

    pub fn catalog(&self) -> &CallTypeCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn log_rejection(call: &RawDispatchCall, reason: &RecordRejection) {
    log::debug!(
        "dropping call {}: {}",
        call.cad_number.as_deref().unwrap_or("<no id>"),
        reason
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{GeoPoint, Priority};

    const INSIDE: GeoPoint = GeoPoint {
        lon: -122.42,
        lat: 37.77,
    };

    fn record(id: &str, received: TimestampMs, priority: Priority) -> DispatchRecord {
        DispatchRecord::new(id, received, None, priority, "246 - SHOOTING", INSIDE)
    }

    fn three_calls() -> EventStore {
        let mut store = EventStore::default();
        store.ingest_at(
            vec![
                record("c", 20, Priority::C),
                record("a", 0, Priority::A),
                record("b", 10, Priority::B),
            ],
            0,
        );
        store
    }

    #[test]
    fn ingest_sorts_and_filters() {
        let mut store = EventStore::default();
        let outside = DispatchRecord::new(
            "far",
            5,
            None,
            Priority::A,
            "219 - ROBBERY",
            GeoPoint {
                lon: -121.0,
                lat: 37.77,
            },
        );
        let summary = store.ingest_at(
            vec![
                record("2", 300, Priority::B),
                outside,
                record("1", 100, Priority::A),
                record("3", 200, Priority::C),
            ],
            0,
        );
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.out_of_bounds, 1);
        assert!(!summary.fallback_window);

        let times: Vec<_> = store.records().iter().map(|r| r.received_time).collect();
        assert_eq!(times, vec![100, 200, 300]);
        assert_eq!(store.window(), (100, 300));
        assert!(store
            .records()
            .iter()
            .all(|r| SF_BOUNDS.contains(r.location.lon, r.location.lat)));
    }

    #[test]
    fn ingest_empty_falls_back_to_day_window() {
        let mut store = EventStore::default();
        let summary = store.ingest_at(Vec::new(), 1_000_000_000);
        assert!(summary.fallback_window);
        assert!(store.is_empty());
        assert_eq!(
            store.window(),
            (1_000_000_000 - FALLBACK_WINDOW_MS, 1_000_000_000)
        );
        assert!(store.activate_due(i64::MAX).is_empty());
        assert_eq!(store.mark_completed_due(i64::MAX), 0);
    }

    #[test]
    fn ingest_drops_duplicate_ids() {
        let mut store = EventStore::default();
        let summary = store.ingest_at(
            vec![record("x", 10, Priority::A), record("x", 20, Priority::B)],
            0,
        );
        assert_eq!(summary.duplicates, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].received_time, 10);
    }

    #[test]
    fn ingest_raw_counts_rejections() {
        let mut store = EventStore::default();
        let good = RawDispatchCall {
            cad_number: Some("1".into()),
            call_type: Some("915 - SUSPICIOUS PERSON".into()),
            received_datetime: Some("2024-05-01T00:00:00Z".into()),
            priority: Some("B".into()),
            point: Some(crate::dispatch::RawPoint {
                kind: None,
                coordinates: vec![-122.44, 37.75],
            }),
            ..Default::default()
        };
        let no_point = RawDispatchCall {
            point: None,
            ..good.clone()
        };
        let summary = store.ingest_raw_at(&[good, no_point], 0);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(store.catalog().label("915"), "915 - SUSPICIOUS PERSON");
    }

    #[test]
    fn activate_due_scenario() {
        let mut store = three_calls();

        let first: Vec<_> = store.activate_due(15).iter().map(|r| r.id.clone()).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert!(store.records()[0].is_activated());
        assert!(store.records()[1].is_activated());
        assert!(!store.records()[2].is_activated());

        assert!(store.activate_due(15).is_empty());

        let last: Vec<_> = store.activate_due(25).iter().map(|r| r.id.clone()).collect();
        assert_eq!(last, vec!["c"]);
    }

    #[test]
    fn activation_is_at_most_once_for_non_decreasing_times() {
        let mut store = three_calls();
        let mut seen = Vec::new();
        for t in [-5, 0, 0, 3, 10, 10, 19, 20, 100] {
            seen.extend(store.activate_due(t).iter().map(|r| r.received_time));
        }
        assert_eq!(seen, vec![0, 10, 20]);
    }

    #[test]
    fn reset_allows_reactivation() {
        let mut store = three_calls();
        store.activate_due(100);
        store.mark_completed_due(i64::MAX);
        store.reset();
        assert!(store
            .records()
            .iter()
            .all(|r| !r.is_activated() && !r.is_completed()));
        assert_eq!(store.activate_due(100).len(), 3);
    }

    #[test]
    fn completion_follows_on_scene_time() {
        let mut store = three_calls();
        let five_min = 5 * 60 * 1000;
        assert_eq!(store.mark_completed_due(five_min), 1);
        assert!(store.is_completed("a"));
        assert!(!store.is_completed("b"));
        assert_eq!(store.mark_completed_due(five_min), 0);
        assert!(!store.is_completed("missing"));
    }
}
