use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Connection control
        .route("/voice/connect", post(handlers::connect))
        // Capture control
        .route("/voice/capture/start", post(handlers::start_capture))
        .route("/voice/capture/stop", post(handlers::stop_capture))
        // Typed input
        .route("/voice/text", post(handlers::send_text))
        // Playback control
        .route("/voice/say", post(handlers::speak_reply))
        .route("/voice/playback/stop", post(handlers::stop_playback))
        // Queries
        .route("/voice/status", get(handlers::get_status))
        .route("/voice/transcript", get(handlers::get_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
