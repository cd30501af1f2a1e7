use super::{FramePipeline, PipelineContext, SharedRoster, ViewerSet};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared state for the camera node
pub struct CameraAppState {
    pub pipeline: PipelineContext,
    pub max_frame_bytes: usize,
}

impl CameraAppState {
    pub fn roster(&self) -> &SharedRoster {
        &self.pipeline.roster
    }

    pub fn viewers(&self) -> &ViewerSet {
        &self.pipeline.viewers
    }
}

/// Camera node router: frame stream on `/` and `/ws`, roster reload.
pub fn create_camera_router(state: Arc<CameraAppState>) -> Router {
    Router::new()
        .route("/", get(stream_handler))
        .route("/ws", get(stream_handler))
        .route("/api/roster/reload", post(reload_roster))
        .with_state(state)
}

async fn stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<CameraAppState>>) -> Response {
    ws.max_message_size(state.max_frame_bytes)
        .max_frame_size(state.max_frame_bytes)
        .on_upgrade(move |socket| handle_stream(socket, state))
}

/// POST /api/roster/reload - rebuild the roster from the enrollment directory
async fn reload_roster(State(state): State<Arc<CameraAppState>>) -> impl IntoResponse {
    let enrolled = state.roster().reload();
    Json(json!({ "status": "ok", "enrolled": enrolled }))
}

/// One camera or viewer connection.
///
/// Every connection is a viewer. Binary messages are treated as frames and
/// run through a pipeline owned by this connection.
async fn handle_stream(mut socket: WebSocket, state: Arc<CameraAppState>) {
    let viewers = state.viewers().clone();
    let (viewer_id, mut frames_rx) = viewers.join();
    let mut pipeline = FramePipeline::new(state.pipeline.clone());

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                match msg {
                    Ok(Message::Binary(bytes)) => {
                        if pipeline.handle_frame(&bytes).await.is_none() {
                            debug!(viewer_id = %viewer_id, "Dropping undecodable frame");
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Camera stream error");
                        break;
                    }
                }
            }

            Some(frame) = frames_rx.recv() => {
                if let Err(e) = socket.send(Message::Binary(frame.to_vec())).await {
                    debug!(viewer_id = %viewer_id, error = %e, "Viewer send failed");
                    break;
                }
            }

            else => break,
        }
    }

    viewers.leave(&viewer_id);
    info!(
        viewer_id = %viewer_id,
        frames = pipeline.frames_processed(),
        "Camera stream closed"
    );
}
