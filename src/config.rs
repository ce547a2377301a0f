use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub audio: AudioConfig,
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// HTTP origin of the Virgil backend (e.g. "http://localhost:8000").
    /// The streaming endpoint is derived by swapping the scheme to ws/wss.
    pub origin: String,
    /// Delay before the single scheduled reconnect attempt, in milliseconds
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Capture buffer duration per frame in milliseconds
    pub frame_duration_ms: u64,
}

/// Host commands backing the native-speech fallback path.
///
/// The recognizer is expected to print recognized utterances to stdout, one
/// per line, until killed. The synthesizer receives the text to speak as its
/// final argument.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub recognizer_command: Option<String>,
    pub synthesizer_command: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VIRGIL_VOICE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            backend: BackendConfig::default(),
            audio: AudioConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "virgil-voice".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8990,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            reconnect_delay_ms: 2000,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // what the backend's STT expects
            channels: 1,
            frame_duration_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_backend() {
        let cfg = Config::default();
        assert_eq!(cfg.backend.origin, "http://localhost:8000");
        assert_eq!(cfg.backend.reconnect_delay_ms, 2000);
        assert_eq!(cfg.audio.sample_rate, 16000);
        assert_eq!(cfg.audio.channels, 1);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load("config/does-not-exist").unwrap();
        assert_eq!(cfg.service.name, "virgil-voice");
    }
}
