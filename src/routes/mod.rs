//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! A small stateless HTTP surface over the canvas engine: single-image export
//! of a saved design and bulk generation of one image per CSV row.

pub mod pins;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Designs may embed images as data URLs, so bodies run larger than axum's default.
pub const MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/pins/render", post(pins::render))
        .route("/api/pins/bulk", post(pins::bulk))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
