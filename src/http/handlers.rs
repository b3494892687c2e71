use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::state::AppState;
use crate::audio::AudioSource;
use crate::error::EchoscribeError;
use crate::session::{CaptureSessionConfig, LiveCaptureSession, SessionStats};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCaptureRequest {
    /// Where the audio comes from
    pub source: AudioSource,

    /// Optional capture ID (if not provided, generate UUID)
    pub capture_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub capture_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StopCaptureResponse {
    pub capture_id: String,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub capture_id: String,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(err: &EchoscribeError) -> StatusCode {
    match err {
        // The caller asked for a source we cannot provide
        EchoscribeError::CaptureUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EchoscribeError::ConnectionFailure { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /captures/start
/// Start a new live capture
pub async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> impl IntoResponse {
    let capture_id = req
        .capture_id
        .unwrap_or_else(|| format!("capture-{}", uuid::Uuid::new_v4()));

    info!("Starting capture: {}", capture_id);

    {
        let captures = state.captures.read().await;
        if captures.contains_key(&capture_id) {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("Capture {} is already live", capture_id),
                }),
            )
                .into_response();
        }
    }

    let config = CaptureSessionConfig {
        capture_id: capture_id.clone(),
        audio: state.config.capture_config(),
        stream: state.config.stream_config(),
        reconnect: state.config.reconnect_policy(),
    };

    let session = Arc::new(LiveCaptureSession::new(config));

    if let Err(e) = session.start(req.source).await {
        error!("Failed to start capture {}: {}", capture_id, e);
        return (
            error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response();
    }

    {
        let mut captures = state.captures.write().await;
        captures.insert(capture_id.clone(), session);
    }

    info!("Capture started: {}", capture_id);

    (
        StatusCode::OK,
        Json(StartCaptureResponse {
            capture_id,
            status: "live".to_string(),
        }),
    )
        .into_response()
}

/// POST /captures/stop/:capture_id
/// Stop a live capture
pub async fn stop_capture(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping capture: {}", capture_id);

    let session = {
        let mut captures = state.captures.write().await;
        captures.remove(&capture_id)
    };

    match session {
        Some(session) => {
            let stats = session.stop().await;
            (
                StatusCode::OK,
                Json(StopCaptureResponse {
                    capture_id,
                    status: "stopped".to_string(),
                    stats,
                }),
            )
                .into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Capture {} not found", capture_id),
            }),
        )
            .into_response(),
    }
}

/// GET /captures/:capture_id/status
/// Get status of a capture session
pub async fn get_capture_status(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let captures = state.captures.read().await;

    match captures.get(&capture_id) {
        Some(session) => (StatusCode::OK, Json(session.stats().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Capture {} not found", capture_id),
            }),
        )
            .into_response(),
    }
}

/// GET /captures/:capture_id/transcript
/// Get the live transcript accumulated so far
pub async fn get_capture_transcript(
    State(state): State<AppState>,
    Path(capture_id): Path<String>,
) -> impl IntoResponse {
    let captures = state.captures.read().await;

    match captures.get(&capture_id) {
        Some(session) => (
            StatusCode::OK,
            Json(TranscriptResponse {
                capture_id: capture_id.clone(),
                transcript: session.transcript().await,
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Capture {} not found", capture_id),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
