use crate::gui_bridge::model::VisualizationModel;
use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::json;
use smokecore::dispatch::RawDispatchCall;
use smokecore::playback::{BatchSender, BatchSource, PlaybackCommand};
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
};
use tokio::sync::mpsc;
use warp::{http::StatusCode, Filter};

#[derive(Debug)]
struct BridgeError;

impl warp::reject::Reject for BridgeError {}

type SharedModel = Arc<RwLock<VisualizationModel>>;

/// HTTP face of a running session: serves the latest frame and forwards
/// controls and record batches to the frame loop.
#[derive(Clone)]
pub struct GuiBridge {
    state: SharedModel,
    inbox: BatchSender,
    controls: mpsc::UnboundedSender<PlaybackCommand>,
}

impl GuiBridge {
    pub fn new(inbox: BatchSender, controls: mpsc::UnboundedSender<PlaybackCommand>) -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::default())),
            inbox,
            controls,
        }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());
        let controls = self.controls.clone();
        let controls_filter = warp::any().map(move || controls.clone());
        let inbox = self.inbox.clone();
        let inbox_filter = warp::any().map(move || inbox.clone());

        let frame_route = warp::path("frame")
            .and(warp::get())
            .and(state_filter)
            .map(|state: SharedModel| {
                let guard = state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
                warp::reply::json(&*guard)
            });

        let control_route = warp::path("control")
            .and(warp::post())
            .and(warp::body::json())
            .and(controls_filter)
            .and_then(
                |command: PlaybackCommand,
                 controls: mpsc::UnboundedSender<PlaybackCommand>| async move {
                    match controls.send(command) {
                        Ok(()) => Ok::<_, warp::Rejection>(warp::reply::with_status(
                            warp::reply::json(&json!({"status": "ok"})),
                            StatusCode::OK,
                        )),
                        Err(err) => {
                            warn!("control dropped: {}", err);
                            Err(warp::reject::custom(BridgeError))
                        }
                    }
                },
            );

        let ingest_route = warp::path("ingest")
            .and(warp::post())
            .and(warp::body::json())
            .and(inbox_filter)
            .and_then(
                |calls: Vec<RawDispatchCall>, inbox: BatchSender| async move {
                    let count = calls.len();
                    match inbox.submit(BatchSource::Manual, calls) {
                        Ok(generation) => {
                            info!("[GUI] ingest of {} calls queued as batch {}", count, generation);
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "generation": generation,
                                    "calls": count,
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            warn!("ingest error: {}", err);
                            Err(warp::reject::custom(BridgeError))
                        }
                    }
                },
            );

        frame_route.or(control_route).or(ingest_route)
    }

    /// Binds `addr` and serves on the current tokio runtime.
    pub fn serve(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_ephemeral(addr)
            .with_context(|| format!("binding GUI bridge on {}", addr))?;
        tokio::spawn(server);
        self.publish_status(&format!("HTTP bridge listening on http://{}", bound));
        Ok(bound)
    }

    pub fn publish(&self, model: VisualizationModel) {
        let mut guard = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = model;
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
    }

    pub fn snapshot(&self) -> VisualizationModel {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smokecore::prelude::EngineConfig;
    use smokecore::PlaybackSession;

    fn bridge() -> (
        GuiBridge,
        PlaybackSession,
        mpsc::UnboundedReceiver<PlaybackCommand>,
    ) {
        let session = PlaybackSession::new(EngineConfig::default()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (GuiBridge::new(session.inbox(), tx), session, rx)
    }

    #[test]
    fn gui_bridge_updates_state() {
        let (gui, session, _rx) = bridge();
        gui.publish(VisualizationModel {
            snapshot: session.snapshot(),
            status: "ready".into(),
            mic_level: 0.07,
            metrics: session.metrics(),
        });
        assert_eq!(gui.snapshot().status, "ready");
        assert_eq!(gui.snapshot().mic_level, 0.07);
    }

    #[tokio::test]
    async fn frame_route_serves_model() {
        let (gui, _session, _rx) = bridge();
        gui.publish(VisualizationModel {
            status: "playing".into(),
            ..Default::default()
        });
        let response = warp::test::request()
            .method("GET")
            .path("/frame")
            .reply(&gui.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "playing");
        assert!(body["sprites"].is_array());
        assert!(body["mic_level"].is_number());
        assert!(body["wind"].is_number());
    }

    #[tokio::test]
    async fn control_route_forwards_commands() {
        let (gui, _session, mut rx) = bridge();
        let response = warp::test::request()
            .method("POST")
            .path("/control")
            .json(&PlaybackCommand::ScrubTo(0.5))
            .reply(&gui.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.try_recv().unwrap(), PlaybackCommand::ScrubTo(0.5));
    }

    #[tokio::test]
    async fn control_route_forwards_resize() {
        let (gui, _session, mut rx) = bridge();
        let resize = PlaybackCommand::Resize {
            width: 900.0,
            height: 600.0,
        };
        let response = warp::test::request()
            .method("POST")
            .path("/control")
            .json(&resize)
            .reply(&gui.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.try_recv().unwrap(), resize);
    }

    #[tokio::test]
    async fn ingest_route_queues_batch() {
        let (gui, mut session, _rx) = bridge();
        let calls = crate::generator::profile::build_calls(&Default::default()).unwrap();
        let response = warp::test::request()
            .method("POST")
            .path("/ingest")
            .json(&calls)
            .reply(&gui.routes())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        session.advance(16.0, 0.0);
        assert_eq!(session.store().len(), calls.len());
    }
}
