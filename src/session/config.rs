use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::config::Config;

/// Configuration for one voice session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Opaque identifier correlating this client with backend state
    pub session_id: String,

    /// HTTP origin of the backend; the ws endpoint is derived from it
    pub backend_origin: String,

    /// Delay before the single scheduled reconnect attempt
    pub reconnect_delay: Duration,

    /// Microphone capture format
    pub capture: CaptureConfig,
}

impl SessionConfig {
    pub fn from_config(cfg: &Config, session_id: String) -> Self {
        Self {
            session_id,
            backend_origin: cfg.backend.origin.clone(),
            reconnect_delay: Duration::from_millis(cfg.backend.reconnect_delay_ms),
            capture: CaptureConfig {
                sample_rate: cfg.audio.sample_rate,
                channels: cfg.audio.channels,
                frame_duration_ms: cfg.audio.frame_duration_ms,
            },
        }
    }

    /// The streaming endpoint for this session.
    pub fn endpoint(&self) -> String {
        crate::ws::audio_endpoint(&self.backend_origin, &self.session_id)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            backend_origin: "http://localhost:8000".to_string(),
            reconnect_delay: Duration::from_secs(2),
            capture: CaptureConfig::default(),
        }
    }
}
