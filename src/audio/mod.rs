//! Audio I/O: microphone capture, level metering, utterance payload
//! assembly, and synthesized-reply playback.

pub mod backend;
pub mod level;
pub mod microphone;
pub mod payload;
pub mod playback;

pub use backend::{AudioFrame, CaptureBackend, CaptureConfig};
pub use level::{LevelMeter, METER_SLOTS};
pub use microphone::MicrophoneBackend;
pub use payload::assemble_wav;
pub use playback::{decode_reply, Player, ReplyAudio, RodioPlayer};
