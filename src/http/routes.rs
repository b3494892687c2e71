use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Capture control
        .route("/captures/start", post(handlers::start_capture))
        .route("/captures/stop/:capture_id", post(handlers::stop_capture))
        // Capture queries
        .route(
            "/captures/:capture_id/status",
            get(handlers::get_capture_status),
        )
        .route(
            "/captures/:capture_id/transcript",
            get(handlers::get_capture_transcript),
        )
        // The control API is driven from a browser page
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
