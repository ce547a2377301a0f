use crate::session::VoiceSession;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one voice session this process owns
    pub session: VoiceSession,
}

impl AppState {
    pub fn new(session: VoiceSession) -> Self {
        Self { session }
    }
}
