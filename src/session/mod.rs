//! Voice session management
//!
//! This module provides the `VoiceSession` abstraction that manages:
//! - Capability detection and the streaming-vs-fallback decision
//! - Microphone capture and level metering
//! - WebSocket streaming of recorded utterances
//! - Playback of synthesized replies and the read-aloud affordance
//! - Reconnect scheduling and session statistics

mod config;
mod events;
pub mod identity;
mod session;
mod states;
mod stats;

pub use config::SessionConfig;
pub use events::SessionEvent;
pub use session::{SessionParts, VoiceSession};
pub use states::{CaptureState, ConnectionState, FallbackState, PlaybackState, SessionState};
pub use stats::{ConversationEntry, Role, SessionStats};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::audio::{CaptureBackend, MicrophoneBackend, Player, RodioPlayer};
use crate::capability::CapabilityReport;
use crate::config::Config;
use crate::speech::{self, CommandRecognizer, CommandSynthesizer, Recognizer, Synthesizer};
use crate::ws::WsTransport;

/// Wire a production session from application config: probe the host, load
/// the persisted session identifier, and plug in the real device backends.
pub fn bootstrap(cfg: &Config) -> Result<(VoiceSession, mpsc::Receiver<SessionEvent>)> {
    let report = CapabilityReport::probe(&cfg.fallback);
    let capability = report.classify();

    let state_path =
        identity::default_state_path().context("No usable data directory for session state")?;
    let session_id = identity::load_or_generate(&state_path)?;

    let session_config = SessionConfig::from_config(cfg, session_id);

    let recognizer: Option<Box<dyn Recognizer>> = cfg
        .fallback
        .recognizer_command
        .as_deref()
        .filter(|cmd| speech::command_available(cmd))
        .map(|cmd| Box::new(CommandRecognizer::new(cmd.to_string())) as Box<dyn Recognizer>);

    let synthesizer: Option<Box<dyn Synthesizer>> = cfg
        .fallback
        .synthesizer_command
        .as_deref()
        .filter(|cmd| speech::command_available(cmd))
        .map(|cmd| Box::new(CommandSynthesizer::new(cmd.to_string())) as Box<dyn Synthesizer>);

    let capture =
        Box::new(MicrophoneBackend::new(session_config.capture.clone())) as Box<dyn CaptureBackend>;
    let player = Box::new(RodioPlayer::new()) as Box<dyn Player>;

    let parts = SessionParts {
        transport: Arc::new(WsTransport),
        capture,
        player,
        recognizer,
        synthesizer,
    };

    Ok(VoiceSession::new(session_config, capability, report, parts))
}
