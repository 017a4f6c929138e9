//! HTTP middleware for the API server.

use axum::http::{Method, header};
use tower_http::cors::{Any, CorsLayer};

/// Create CORS middleware layer. Dashboards are served from other origins.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
