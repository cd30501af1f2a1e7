// Hub HTTP and WebSocket APIs

mod error;
mod faces;
mod ingestion;
pub mod query;
pub mod websocket;

use crate::media::FaceStore;
use crate::state::HubState;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use faces::create_faces_router;
pub use ingestion::create_ingestion_router;
pub use query::create_query_router;
pub use websocket::{create_ws_router, ws_handler};

/// Shared application state for hub handlers
pub struct HubAppState {
    pub hub: Arc<HubState>,
    pub faces: Arc<FaceStore>,
}

/// Full hub router: ingestion, faces, state query and WebSocket fanout.
pub fn create_hub_router(state: Arc<HubAppState>) -> Router {
    Router::new()
        .merge(create_ingestion_router(Arc::clone(&state)))
        .merge(create_faces_router(Arc::clone(&state)))
        .merge(create_query_router(Arc::clone(&state)))
        .merge(create_ws_router(state))
        .layer(CorsLayer::permissive())
}
