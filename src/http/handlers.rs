use super::state::AppState;
use crate::error::SessionClosed;
use crate::session::{Command, SessionState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub accepted: String,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /session/status
/// Current session statistics
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.stats()))
}

/// GET /session/transcript
/// Recent transcript entries, oldest first
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.transcript()))
}

/// POST /session/reconnect
pub async fn reconnect(State(state): State<AppState>) -> Response {
    info!("Reconnect requested over HTTP");
    send_command(&state, Command::Reconnect, "reconnect").await
}

/// POST /camera/flip
pub async fn flip_camera(State(state): State<AppState>) -> Response {
    info!("Camera flip requested over HTTP");
    send_command(&state, Command::FlipCamera, "flip-camera").await
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn send_command(state: &AppState, command: Command, name: &str) -> Response {
    match state.session.send(command).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(CommandResponse {
                accepted: name.to_string(),
                state: state.session.stats().state,
            }),
        )
            .into_response(),
        Err(e @ SessionClosed) => {
            error!("Failed to send {}: {}", name, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
