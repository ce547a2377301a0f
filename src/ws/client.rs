// Streaming transport to the backend speech service.
//
// One `Connection` wraps one WebSocket: an outbound channel the session
// writes frames into, and an inbound channel of parsed server messages
// terminated by a close notice. The split sink/stream each get their own
// loop task; both wind down when the socket closes or the session drops its
// half of the channels.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::messages::{parse_server_message, ServerMessage};

/// Frame the session sends to the backend.
#[derive(Debug)]
pub enum OutboundFrame {
    /// One complete recorded utterance (WAV payload).
    Audio(Vec<u8>),
    /// Typed input, already serialized JSON.
    Text(String),
    /// User-initiated close; the peer sees a normal close code.
    Close,
}

/// Inbound event from the transport.
#[derive(Debug)]
pub enum TransportEvent {
    Message(ServerMessage),
    /// The socket closed. `normal` reflects the close code: a normal close
    /// is user-initiated teardown, anything else schedules a reconnect.
    Closed { normal: bool },
}

/// A live connection: write frames, read events.
pub struct Connection {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Transport seam: opens connections to a streaming endpoint.
///
/// The production implementation speaks WebSocket via tokio-tungstenite;
/// tests substitute an in-memory pair.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection>;
}

pub struct WsTransport;

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        info!("Connecting to voice service at {}", url);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .context("Failed to open WebSocket to the voice service")?;

        let (mut ws_sink, mut ws_source) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(32);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(64);

        // Outbound loop: session frames → socket.
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let result = match frame {
                    OutboundFrame::Audio(payload) => {
                        debug!("Sending utterance payload: {} bytes", payload.len());
                        ws_sink.send(WsMessage::Binary(payload)).await
                    }
                    OutboundFrame::Text(json) => ws_sink.send(WsMessage::Text(json)).await,
                    OutboundFrame::Close => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "session teardown".into(),
                        };
                        let _ = ws_sink.send(WsMessage::Close(Some(frame))).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    warn!("WebSocket send failed: {}", e);
                    break;
                }
            }
            debug!("Outbound loop terminated");
        });

        // Inbound loop: socket → parsed events.
        tokio::spawn(async move {
            while let Some(msg) = ws_source.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        if let Some(parsed) = parse_server_message(&text) {
                            if event_tx.send(TransportEvent::Message(parsed)).await.is_err() {
                                debug!("Event receiver dropped, closing inbound loop");
                                return;
                            }
                        }
                    }
                    Ok(WsMessage::Close(frame)) => {
                        let normal = frame
                            .as_ref()
                            .map(|f| f.code == CloseCode::Normal)
                            .unwrap_or(false);
                        info!("Voice service closed the connection (normal={})", normal);
                        let _ = event_tx.send(TransportEvent::Closed { normal }).await;
                        return;
                    }
                    Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {
                        // Handled by tungstenite automatically
                    }
                    Ok(WsMessage::Binary(data)) => {
                        debug!("Ignoring unexpected binary frame ({} bytes)", data.len());
                    }
                    Err(e) => {
                        warn!("WebSocket receive error: {}", e);
                        let _ = event_tx.send(TransportEvent::Closed { normal: false }).await;
                        return;
                    }
                }
            }
            // Stream ended without a close frame: treat as abnormal.
            let _ = event_tx.send(TransportEvent::Closed { normal: false }).await;
            debug!("Inbound loop terminated");
        });

        Ok(Connection {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}
