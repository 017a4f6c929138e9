//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{builds, health};
use crate::middleware::cors_layer;
use crate::state::AppState;
use crate::ws;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/build", post(builds::trigger_build))
        .route("/webhook", post(builds::trigger_webhook))
        .route("/builds", get(builds::list_builds))
        .route("/build/{id}", get(builds::get_build))
}
