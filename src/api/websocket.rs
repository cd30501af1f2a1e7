use crate::api::HubAppState;
use crate::subscription::ConnectionManager;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;

/// GET /api/ws - WebSocket upgrade handler for dashboards and hub subscribers
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<HubAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| {
        let manager = ConnectionManager::new(Arc::clone(&state.hub));
        manager.handle(socket)
    })
}

/// Create WebSocket router
pub fn create_ws_router(state: Arc<HubAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}
