use serde::{Deserialize, Serialize};
use tracing::debug;

/// Terminal result of one utterance: what the backend heard and how it
/// replied, with optional synthesized speech.
#[derive(Debug, Clone, Deserialize)]
pub struct UtteranceResponse {
    /// Transcription of the user's audio; absent for typed input.
    #[serde(default)]
    pub transcription: Option<String>,
    /// The assistant's reply text.
    pub response: String,
    /// Base64-encoded synthesized speech; absence means no audio this turn.
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Backend-side timing breakdown; logged, not interpreted.
    #[serde(default)]
    pub processing_time: Option<serde_json::Value>,
}

/// Server→client message, discriminated by its `type` tag.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Informational; `status == "processing"` drives the thinking indicator.
    Status {
        status: String,
        message: Option<String>,
    },
    Response(UtteranceResponse),
    /// Message-level error; the connection stays open.
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Parse one inbound text frame.
///
/// The tag is dispatched manually off a JSON value so an unknown `type`
/// (or a missing one) degrades to a logged skip instead of failing the
/// inbound loop, since the backend is free to add message kinds.
pub fn parse_server_message(text: &str) -> Option<ServerMessage> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!("Discarding unparseable server frame: {}", e);
            return None;
        }
    };

    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("");
    match kind {
        "status" => match serde_json::from_value::<StatusBody>(value.clone()) {
            Ok(body) => Some(ServerMessage::Status {
                status: body.status,
                message: body.message,
            }),
            Err(e) => {
                debug!("Malformed status message: {}", e);
                None
            }
        },
        "response" => match serde_json::from_value::<UtteranceResponse>(value.clone()) {
            Ok(body) => Some(ServerMessage::Response(body)),
            Err(e) => {
                debug!("Malformed response message: {}", e);
                None
            }
        },
        "error" => match serde_json::from_value::<ErrorBody>(value.clone()) {
            Ok(body) => Some(ServerMessage::Error { error: body.error }),
            Err(e) => {
                debug!("Malformed error message: {}", e);
                None
            }
        },
        other => {
            debug!("Ignoring unrecognized server message type '{}'", other);
            None
        }
    }
}

/// Client→server typed input. Audio goes out as a raw binary frame instead.
#[derive(Debug, Serialize)]
pub struct TextInputMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl TextInputMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "text",
            text: text.into(),
        }
    }
}

/// Derive the streaming endpoint from the backend's HTTP origin.
pub fn audio_endpoint(origin: &str, session_id: &str) -> String {
    let ws_origin = if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        origin.to_string()
    };
    format!("{}/ws/audio/{}", ws_origin.trim_end_matches('/'), session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_with_audio() {
        let json = r#"{
            "type": "response",
            "transcription": "What is artificial intelligence?",
            "response": "AI is computer systems...",
            "audio": "UklGRg==",
            "sample_rate": 16000
        }"#;
        match parse_server_message(json) {
            Some(ServerMessage::Response(r)) => {
                assert_eq!(
                    r.transcription.as_deref(),
                    Some("What is artificial intelligence?")
                );
                assert_eq!(r.response, "AI is computer systems...");
                assert_eq!(r.audio.as_deref(), Some("UklGRg=="));
                assert_eq!(r.sample_rate, Some(16000));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn parse_response_without_audio() {
        let json = r#"{"type": "response", "response": "Hello"}"#;
        match parse_server_message(json) {
            Some(ServerMessage::Response(r)) => {
                assert!(r.audio.is_none());
                assert!(r.sample_rate.is_none());
                assert!(r.transcription.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn parse_processing_status() {
        let json = r#"{"type": "status", "status": "processing", "message": "Transcribing"}"#;
        match parse_server_message(json) {
            Some(ServerMessage::Status { status, message }) => {
                assert_eq!(status, "processing");
                assert_eq!(message.as_deref(), Some("Transcribing"));
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_message() {
        let json = r#"{"type": "error", "error": "Transcription failed"}"#;
        match parse_server_message(json) {
            Some(ServerMessage::Error { error }) => assert_eq!(error, "Transcription failed"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_skipped() {
        assert!(parse_server_message(r#"{"type": "heartbeat", "ts": 1}"#).is_none());
        assert!(parse_server_message(r#"{"no_type": true}"#).is_none());
        assert!(parse_server_message("not json at all").is_none());
    }

    #[test]
    fn text_input_wire_shape() {
        let msg = TextInputMessage::new("hello virgil");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"text","text":"hello virgil"}"#);
    }

    #[test]
    fn endpoint_swaps_scheme() {
        assert_eq!(
            audio_endpoint("http://localhost:8000", "abc"),
            "ws://localhost:8000/ws/audio/abc"
        );
        assert_eq!(
            audio_endpoint("https://virgil.example.com/", "abc"),
            "wss://virgil.example.com/ws/audio/abc"
        );
    }
}
