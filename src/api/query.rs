use crate::api::HubAppState;
use crate::state::SensorSnapshot;
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

/// Create query API router
pub fn create_query_router(state: Arc<HubAppState>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .with_state(state)
}

/// GET /api/state - Current sensor snapshot
async fn get_state(State(state): State<Arc<HubAppState>>) -> Json<SensorSnapshot> {
    Json(state.hub.snapshot())
}
