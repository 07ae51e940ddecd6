use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/session/status", get(handlers::get_status))
        .route("/session/transcript", get(handlers::get_transcript))
        // Session control
        .route("/session/reconnect", post(handlers::reconnect))
        .route("/camera/flip", post(handlers::flip_camera))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
