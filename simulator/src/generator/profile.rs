use anyhow::ensure;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smokecore::dispatch::{RawDispatchCall, RawPoint};
use smokecore::math::projection::SF_BOUNDS;

/// Configuration for generating synthetic dispatch calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub count: usize,
    pub window_hours: u32,
    pub seed: u64,
    pub call_types: Vec<String>,
    pub priorities: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 200,
            window_hours: 24,
            seed: 0,
            call_types: [
                "246 - SHOOTING",
                "415 - DISTURBING THE PEACE",
                "602 - TRESPASSING",
                "915 - SUSPICIOUS PERSON",
                "917 - SHOTS FIRED",
                "219 - ROBBERY",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            priorities: vec!["A".into(), "B".into(), "C".into()],
        }
    }
}

/// Calls spread uniformly over the `window_hours` before `now`, at uniform
/// locations inside SF_BOUNDS.
pub fn build_calls_at(
    config: &GeneratorConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<RawDispatchCall>> {
    ensure!(!config.call_types.is_empty(), "generator needs at least one call type");
    ensure!(!config.priorities.is_empty(), "generator needs at least one priority");
    ensure!(config.window_hours > 0, "generator window must be at least one hour");

    let mut rng = StdRng::seed_from_u64(config.seed);
    let end = now.timestamp_millis();
    let start = end - i64::from(config.window_hours) * 60 * 60 * 1000;

    let mut calls = Vec::with_capacity(config.count);
    for index in 0..config.count {
        let received_ms = rng.gen_range(start..=end);
        let received = DateTime::from_timestamp_millis(received_ms).unwrap_or(now);
        let stamp = received.to_rfc3339_opts(SecondsFormat::Millis, true);
        let call_type = config.call_types.choose(&mut rng).cloned();
        let priority = config.priorities.choose(&mut rng).cloned();
        let lon = rng.gen_range(SF_BOUNDS.min_lon..=SF_BOUNDS.max_lon);
        let lat = rng.gen_range(SF_BOUNDS.min_lat..=SF_BOUNDS.max_lat);

        calls.push(RawDispatchCall {
            cad_number: Some(format!("SIM{index}")),
            call_type,
            received_datetime: Some(stamp.clone()),
            call_date: Some(stamp),
            onscene_datetime: None,
            priority,
            point: Some(RawPoint {
                kind: Some("Point".into()),
                coordinates: vec![lon, lat],
            }),
        });
    }

    Ok(calls)
}

pub fn build_calls(config: &GeneratorConfig) -> anyhow::Result<Vec<RawDispatchCall>> {
    build_calls_at(config, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokecore::playback::EventStore;

    #[test]
    fn generator_builds_expected_count() {
        let calls = build_calls(&GeneratorConfig::default()).unwrap();
        assert_eq!(calls.len(), 200);
        assert!(calls.iter().all(|c| c.normalize().is_ok()));
    }

    #[test]
    fn generator_is_seeded_and_stays_in_bounds() {
        let config = GeneratorConfig {
            count: 50,
            seed: 13,
            ..Default::default()
        };
        let now = Utc::now();
        let first = build_calls_at(&config, now).unwrap();
        let second = build_calls_at(&config, now).unwrap();
        assert_eq!(first, second);

        let mut store = EventStore::default();
        let summary = store.ingest_raw(&first);
        assert_eq!(summary.accepted, 50);
        assert_eq!(summary.out_of_bounds, 0);
        let (oldest, newest) = store.window();
        assert!(newest - oldest <= 24 * 60 * 60 * 1000);
    }

    #[test]
    fn generator_rejects_empty_call_types() {
        let config = GeneratorConfig {
            call_types: Vec::new(),
            ..Default::default()
        };
        assert!(build_calls(&config).is_err());
    }
}
