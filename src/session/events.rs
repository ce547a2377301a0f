use serde::Serialize;

/// Event delivered to the embedding caller (CLI, HTTP status stream).
///
/// The session never renders UI itself; every user-visible state change,
/// utterance and failure flows out through this channel, so the caller's
/// controls always reflect the true underlying state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Transient status line (connecting / connected / lost connection...).
    Status { line: String },

    /// The backend is working on the last utterance ("thinking" indicator).
    Thinking,

    /// Terminal result of one streamed utterance.
    Utterance {
        /// What the backend heard; absent for typed input.
        transcript: Option<String>,
        /// The assistant's reply text.
        reply: String,
        /// Whether synthesized speech accompanied the reply.
        has_audio: bool,
    },

    /// A completed utterance recognized by the native fallback path.
    Recognized { text: String },

    /// Visualizer frame: recent amplitude readings, oldest first.
    Level { readings: Vec<f32> },

    /// User-visible, dismissible failure.
    Error { message: String },
}
