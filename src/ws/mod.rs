//! WebSocket transport to the backend speech service.
//!
//! Client→server traffic is one binary WAV payload per completed recording
//! episode, or a JSON text message for typed input. Server→client traffic
//! is JSON discriminated by a `type` tag: `status`, `response`, `error`.

pub mod client;
pub mod messages;

pub use client::{Connection, OutboundFrame, Transport, TransportEvent, WsTransport};
pub use messages::{audio_endpoint, parse_server_message, ServerMessage, TextInputMessage, UtteranceResponse};
