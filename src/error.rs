use thiserror::Error;

/// Failure classes surfaced by voice-session operations.
///
/// Every operation boundary (connect, capture start/stop, send, playback)
/// converts its underlying failure into one of these, and the session turns
/// each into a user-visible status line. None of them is allowed to escape
/// as a panic into the embedding caller.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The host supports neither the streaming path nor native speech.
    /// Terminal: operations on an unsupported session are no-ops.
    #[error("voice input is not supported on this host")]
    CapabilityUnsupported,

    /// Microphone access was denied or the device could not be opened.
    /// Terminal for this attempt; a new capture attempt prompts again.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// The streaming connection dropped; a reconnect has been scheduled.
    #[error("lost connection to the voice service")]
    ConnectionLost,

    /// The recorded utterance could not be delivered. The payload for this
    /// episode is dropped, not retried; a reconnect is triggered instead.
    #[error("failed to send audio: {0}")]
    SendFailure(String),

    /// Decoding or playing a synthesized reply failed; playback resets to idle.
    #[error("playback failed: {0}")]
    PlaybackFailure(String),

    /// Message-level error reported by the backend; the connection stays open.
    #[error("server error: {0}")]
    ServerError(String),

    /// No capture path is available right now (streaming down, no recognizer).
    #[error("no supported voice input method is available")]
    NoInputMethod,

    /// The requested operation conflicts with the session's current state,
    /// e.g. starting capture while a reply is playing.
    #[error("operation not allowed: {0}")]
    InvalidState(&'static str),
}

impl VoiceError {
    /// Whether the user can meaningfully retry the same operation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CapabilityUnsupported)
    }
}
