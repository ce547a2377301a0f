use super::state::AppState;
use crate::error::VoiceError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn ack(message: impl Into<String>) -> (StatusCode, Json<AckResponse>) {
    (
        StatusCode::OK,
        Json(AckResponse {
            status: "ok".to_string(),
            message: message.into(),
        }),
    )
}

fn reject(err: VoiceError) -> (StatusCode, Json<ErrorResponse>) {
    let code = match err {
        VoiceError::CapabilityUnsupported => StatusCode::NOT_IMPLEMENTED,
        VoiceError::InvalidState(_) => StatusCode::CONFLICT,
        VoiceError::NoInputMethod => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        code,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice/connect
/// Open (or re-open) the streaming connection
pub async fn connect(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.connect().await {
        Ok(()) => ack("connect initiated").into_response(),
        Err(e) => reject(e).into_response(),
    }
}

/// POST /voice/capture/start
/// Begin one utterance on whichever capture path is available
pub async fn start_capture(State(state): State<AppState>) -> impl IntoResponse {
    info!("Capture start requested over HTTP");
    match state.session.start_capture().await {
        Ok(()) => ack("capturing").into_response(),
        Err(e) => reject(e).into_response(),
    }
}

/// POST /voice/capture/stop
/// Finish the current utterance and flush it to the backend
pub async fn stop_capture(State(state): State<AppState>) -> impl IntoResponse {
    info!("Capture stop requested over HTTP");
    match state.session.stop_capture().await {
        Ok(()) => ack("utterance flushed").into_response(),
        Err(e) => reject(e).into_response(),
    }
}

/// POST /voice/text
/// Send a typed utterance over the streaming connection
pub async fn send_text(
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> impl IntoResponse {
    match state.session.send_text(&req.text).await {
        Ok(()) => ack("sent").into_response(),
        Err(e) => reject(e).into_response(),
    }
}

/// POST /voice/say
/// Read the last reply aloud through the native synthesizer
pub async fn speak_reply(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.speak_last_reply().await {
        Ok(()) => ack("speaking").into_response(),
        Err(e) => reject(e).into_response(),
    }
}

/// POST /voice/playback/stop
/// Stop reply playback and read-aloud speech
pub async fn stop_playback(State(state): State<AppState>) -> impl IntoResponse {
    state.session.stop_playback().await;
    ack("playback stopped").into_response()
}

/// GET /voice/status
/// Session statistics and lifecycle states
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.session.stats().await;
    (StatusCode::OK, Json(stats)).into_response()
}

/// GET /voice/transcript
/// Accumulated conversation (oldest first)
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let conversation = state.session.conversation().await;
    (StatusCode::OK, Json(conversation)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
