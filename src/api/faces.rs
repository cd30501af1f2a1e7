use crate::api::error::AppError;
use crate::api::HubAppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Promote request body
#[derive(Deserialize)]
struct AddKnownRequest {
    name: Option<String>,
    image_url: Option<String>,
}

#[derive(Serialize)]
struct AddKnownResponse {
    status: &'static str,
    saved_as: String,
}

/// Create router serving stored faces and roster promotion
pub fn create_faces_router(state: Arc<HubAppState>) -> Router {
    Router::new()
        .route("/faces/:filename", get(serve_face))
        .route("/api/add-known", post(add_known))
        .with_state(state)
}

/// GET /faces/:filename - Stored face crop
async fn serve_face(
    State(state): State<Arc<HubAppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state.faces.read(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// POST /api/add-known - Copy a stored face into the enrolled roster
async fn add_known(
    State(state): State<Arc<HubAppState>>,
    body: Bytes,
) -> Result<Json<AddKnownResponse>, AppError> {
    let request: AddKnownRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let (name, image_url) = match (request.name, request.image_url) {
        (Some(name), Some(url)) if !name.is_empty() && !url.is_empty() => (name, url),
        _ => return Err(AppError::ValidationError("missing data".to_string())),
    };

    let saved_as = state.faces.promote(&name, &image_url).await?;

    Ok(Json(AddKnownResponse {
        status: "ok",
        saved_as,
    }))
}
