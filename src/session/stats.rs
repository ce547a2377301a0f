use chrono::{DateTime, Utc};
use serde::Serialize;

use super::states::SessionState;

/// Snapshot of a voice session for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Current lifecycle states (connection, capture, playback, fallback)
    pub state: SessionState,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created
    pub uptime_secs: f64,

    /// Utterances sent over the streaming path
    pub utterances_sent: usize,

    /// Responses received from the backend
    pub responses_received: usize,

    /// Whether an utterance is awaiting its response
    pub awaiting_response: bool,
}

/// One side of the conversation, accumulated in memory for the transcript
/// endpoint. The latest-utterance buffer is separate and overwritten per
/// utterance.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl ConversationEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
