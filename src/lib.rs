pub mod audio;
pub mod capability;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod speech;
pub mod ws;

pub use audio::{
    assemble_wav, decode_reply, AudioFrame, CaptureBackend, CaptureConfig, LevelMeter,
    MicrophoneBackend, Player, ReplyAudio, RodioPlayer,
};
pub use capability::{Capability, CapabilityReport};
pub use config::Config;
pub use error::VoiceError;
pub use http::{create_router, AppState};
pub use session::{
    bootstrap, SessionConfig, SessionEvent, SessionParts, SessionStats, VoiceSession,
};
pub use ws::{ServerMessage, Transport, WsTransport};
