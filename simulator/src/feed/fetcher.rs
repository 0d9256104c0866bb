use anyhow::{ensure, Context};
use chrono::{Duration as ChronoDuration, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use smokecore::dispatch::RawDispatchCall;
use smokecore::playback::{BatchSender, BatchSource, RecordBatch};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::generator::profile::{build_calls, GeneratorConfig};

/// Where and how often to fetch dispatch calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Query the open-data endpoint; when false every fetch is synthetic.
    pub live: bool,
    pub endpoint: String,
    pub limit: usize,
    pub lookback_hours: i64,
    pub timeout_ms: u64,
    pub refresh_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            live: false,
            endpoint: "https://data.sfgov.org/resource/gnap-fj3t.json".into(),
            limit: 200,
            lookback_hours: 24,
            timeout_ms: 3_000,
            refresh_secs: 300,
        }
    }
}

/// Lifecycle of the most recent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    InFlight {
        generation: u64,
    },
    Succeeded {
        generation: u64,
        source: BatchSource,
        calls: usize,
    },
    Failed {
        generation: u64,
        reason: String,
    },
}

/// Single-flight dispatch-call fetcher.
///
/// Starting a request aborts the one still running, and every batch carries
/// the generation reserved at request time, so a superseded result can
/// never replace a newer one.
pub struct DispatchFeed {
    config: FeedConfig,
    generator: GeneratorConfig,
    client: reqwest::Client,
    inbox: BatchSender,
    state: Arc<Mutex<FetchState>>,
    task: Option<JoinHandle<()>>,
}

impl DispatchFeed {
    pub fn new(
        config: FeedConfig,
        generator: GeneratorConfig,
        inbox: BatchSender,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sf-smoke-simulator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            config,
            generator,
            client,
            inbox,
            state: Arc::new(Mutex::new(FetchState::Idle)),
            task: None,
        })
    }

    pub fn state(&self) -> FetchState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or(FetchState::Idle)
    }

    /// Starts a fetch, superseding any request still in flight. Must be
    /// called from within a tokio runtime.
    pub fn request(&mut self) -> u64 {
        self.cancel();
        let generation = self.inbox.reserve();
        set_state(&self.state, FetchState::InFlight { generation });

        let config = self.config.clone();
        let generator = self.generator.clone();
        let client = self.client.clone();
        let inbox = self.inbox.clone();
        let state = self.state.clone();

        self.task = Some(tokio::spawn(async move {
            let outcome = match load_calls(&client, &config, &generator).await {
                Ok((source, calls)) => {
                    let count = calls.len();
                    inbox
                        .send(RecordBatch {
                            generation,
                            source,
                            calls,
                        })
                        .map(|_| FetchState::Succeeded {
                            generation,
                            source,
                            calls: count,
                        })
                        .unwrap_or_else(|err| FetchState::Failed {
                            generation,
                            reason: err.to_string(),
                        })
                }
                Err(err) => FetchState::Failed {
                    generation,
                    reason: format!("{err:#}"),
                },
            };
            if let FetchState::Failed { reason, .. } = &outcome {
                warn!("fetch {} failed: {}", generation, reason);
            }
            set_state(&state, outcome);
        }));
        generation
    }

    /// Aborts the running request, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
                if let FetchState::InFlight { generation } = self.state() {
                    info!("fetch {} superseded", generation);
                    set_state(
                        &self.state,
                        FetchState::Failed {
                            generation,
                            reason: "superseded".into(),
                        },
                    );
                }
            }
        }
    }

    /// Waits for the current request to finish and reports its state.
    pub async fn settle(&mut self) -> FetchState {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("fetch task ended abnormally: {}", err);
            }
        }
        self.state()
    }
}

impl Drop for DispatchFeed {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn set_state(state: &Mutex<FetchState>, value: FetchState) {
    if let Ok(mut guard) = state.lock() {
        *guard = value;
    }
}

/// Live calls when enabled and reachable in time; synthetic calls otherwise.
async fn load_calls(
    client: &reqwest::Client,
    config: &FeedConfig,
    generator: &GeneratorConfig,
) -> anyhow::Result<(BatchSource, Vec<RawDispatchCall>)> {
    if config.live {
        let timeout = Duration::from_millis(config.timeout_ms);
        match tokio::time::timeout(timeout, fetch_live(client, config)).await {
            Ok(Ok(calls)) => return Ok((BatchSource::Live, calls)),
            Ok(Err(err)) => warn!("live feed unavailable, using synthetic calls: {:#}", err),
            Err(_) => warn!(
                "live feed timed out after {} ms, using synthetic calls",
                config.timeout_ms
            ),
        }
    }
    let calls = build_calls(generator).context("generating synthetic calls")?;
    Ok((BatchSource::Synthetic, calls))
}

/// Socrata-style query for the last `lookback_hours` of calls.
pub fn live_query(config: &FeedConfig) -> Vec<(&'static str, String)> {
    let since = Utc::now() - ChronoDuration::hours(config.lookback_hours);
    vec![
        ("$limit", config.limit.to_string()),
        ("$order", "received_datetime DESC".to_string()),
        (
            "$where",
            format!(
                "received_datetime > '{}'",
                since.format("%Y-%m-%dT%H:%M:%S")
            ),
        ),
    ]
}

async fn fetch_live(
    client: &reqwest::Client,
    config: &FeedConfig,
) -> anyhow::Result<Vec<RawDispatchCall>> {
    let response = client
        .get(&config.endpoint)
        .query(&live_query(config))
        .send()
        .await
        .with_context(|| format!("requesting {}", config.endpoint))?
        .error_for_status()
        .context("feed returned an error status")?;
    let calls: Vec<RawDispatchCall> = response.json().await.context("decoding feed rows")?;
    ensure!(!calls.is_empty(), "feed returned no rows");
    Ok(calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokecore::prelude::EngineConfig;
    use smokecore::PlaybackSession;

    fn synthetic_feed(session: &PlaybackSession) -> DispatchFeed {
        let generator = GeneratorConfig {
            count: 20,
            seed: 5,
            ..Default::default()
        };
        DispatchFeed::new(FeedConfig::default(), generator, session.inbox()).unwrap()
    }

    #[test]
    fn live_query_has_limit_order_and_where() {
        let query = live_query(&FeedConfig::default());
        assert_eq!(query[0], ("$limit", "200".to_string()));
        assert_eq!(query[1].1, "received_datetime DESC");
        assert!(query[2].1.starts_with("received_datetime > '"));
    }

    #[tokio::test]
    async fn synthetic_fetch_delivers_batch() {
        let mut session = PlaybackSession::new(EngineConfig::default()).unwrap();
        let mut feed = synthetic_feed(&session);
        assert_eq!(feed.state(), FetchState::Idle);

        let generation = feed.request();
        let state = feed.settle().await;
        assert_eq!(
            state,
            FetchState::Succeeded {
                generation,
                source: BatchSource::Synthetic,
                calls: 20,
            }
        );

        session.advance(16.0, 0.0);
        assert_eq!(session.store().len(), 20);
    }

    #[tokio::test]
    async fn unreachable_live_feed_falls_back() {
        let mut session = PlaybackSession::new(EngineConfig::default()).unwrap();
        let config = FeedConfig {
            live: true,
            endpoint: "http://127.0.0.1:9/unreachable".into(),
            timeout_ms: 500,
            ..Default::default()
        };
        let mut feed = DispatchFeed::new(config, GeneratorConfig::default(), session.inbox()).unwrap();
        feed.request();
        match feed.settle().await {
            FetchState::Succeeded { source, .. } => assert_eq!(source, BatchSource::Synthetic),
            other => panic!("unexpected state {other:?}"),
        }
        session.advance(16.0, 0.0);
        assert_eq!(session.store().len(), 200);
    }

    #[tokio::test]
    async fn newer_request_supersedes_older() {
        let mut session = PlaybackSession::new(EngineConfig::default()).unwrap();
        let mut feed = synthetic_feed(&session);
        let first = feed.request();
        let second = feed.request();
        assert!(second > first);
        assert!(matches!(
            feed.settle().await,
            FetchState::Succeeded { generation, .. } if generation == second
        ));
        session.advance(16.0, 0.0);
        assert_eq!(session.metrics().batches, 1);
    }
}
