use crate::api::error::AppError;
use crate::api::HubAppState;
use crate::event::{AccessEvent, FaceEventPayload, FaceRecord};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::post,
    Router,
};
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Face crops arrive base64-encoded inside JSON
const MAX_FACE_EVENT_BYTES: usize = 16 * 1024 * 1024;

/// Success response for face event ingestion
#[derive(Serialize)]
struct FaceEventResponse {
    status: &'static str,
    image_url: String,
}

#[derive(Serialize)]
struct OkResponse {
    status: &'static str,
}

/// Create ingestion router (face events, access audit relay)
pub fn create_ingestion_router(state: Arc<HubAppState>) -> Router {
    Router::new()
        .route("/api/face-event", post(publish_face_event))
        .route("/api/nfc-event", post(relay_access_event))
        .layer(DefaultBodyLimit::max(MAX_FACE_EVENT_BYTES))
        .with_state(state)
}

/// POST /api/face-event - Store the crop and broadcast a reference to it
async fn publish_face_event(
    State(state): State<Arc<HubAppState>>,
    body: Bytes,
) -> Result<Json<FaceEventResponse>, AppError> {
    let payload: FaceEventPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let image_b64 = match payload.image.as_deref() {
        Some(image) if !image.is_empty() => image,
        _ => return Err(AppError::ValidationError("no image".to_string())),
    };

    let image = base64::engine::general_purpose::STANDARD
        .decode(image_b64)
        .map_err(|e| {
            warn!(error = %e, camera = %payload.camera_id, "Rejecting face event with invalid image");
            AppError::ValidationError("invalid image".to_string())
        })?;

    let stored = state.faces.store(&payload.name, &image).await?;

    info!(
        camera = %payload.camera_id,
        name = %payload.name,
        filename = %stored.filename,
        "Face event stored"
    );

    let image_url = stored.url();
    state.hub.publish_face(FaceRecord {
        camera: payload.camera_id,
        name: payload.name,
        status: payload.status,
        image_url: image_url.clone(),
        time: stored.time,
    });

    Ok(Json(FaceEventResponse {
        status: "ok",
        image_url,
    }))
}

/// POST /api/nfc-event - Relay an access audit from the door node
async fn relay_access_event(
    State(state): State<Arc<HubAppState>>,
    body: Bytes,
) -> Result<Json<OkResponse>, AppError> {
    let event: AccessEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.hub.publish_access(event);

    Ok(Json(OkResponse { status: "ok" }))
}
