//! HTTP API server for external control (desktop shells, scripts)
//!
//! This module provides a REST API for driving the voice session:
//! - POST /voice/connect - Open the streaming connection
//! - POST /voice/capture/start - Begin one utterance
//! - POST /voice/capture/stop - Finish and flush the utterance
//! - POST /voice/text - Send typed input
//! - POST /voice/say - Read the last reply aloud
//! - POST /voice/playback/stop - Stop playback
//! - GET /voice/status - Session states and statistics
//! - GET /voice/transcript - Accumulated conversation
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
