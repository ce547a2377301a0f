#![allow(dead_code)] // not every test binary exercises every probe

// Shared test doubles for the voice session's external collaborators.
//
// Each fake exposes a cloneable probe so the test can script behavior
// (deny the microphone, fail the connect) and observe effects (frames
// played, attempts made) while the session owns the boxed trait object.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};

use virgil_voice::audio::{AudioFrame, CaptureBackend, CaptureConfig, Player, ReplyAudio};
use virgil_voice::capability::{Capability, CapabilityReport};
use virgil_voice::error::VoiceError;
use virgil_voice::session::{SessionConfig, SessionEvent, SessionParts, VoiceSession};
use virgil_voice::speech::{Recognizer, Synthesizer};
use virgil_voice::ws::{Connection, OutboundFrame, Transport, TransportEvent};

// ── Transport ──────────────────────────────────────────────────────

/// One accepted connection, seen from the server side.
pub struct ServerLink {
    pub to_session: mpsc::Sender<TransportEvent>,
    pub from_session: mpsc::Receiver<OutboundFrame>,
}

#[derive(Default)]
pub struct FakeTransport {
    pub attempts: AtomicUsize,
    pub fail: AtomicBool,
    links: Mutex<Vec<ServerLink>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Server side of the most recent connection.
    pub async fn take_link(&self) -> ServerLink {
        self.links
            .lock()
            .await
            .pop()
            .expect("no connection was established")
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, _url: &str) -> Result<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused by test");
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(32);

        self.links.lock().await.push(ServerLink {
            to_session: event_tx,
            from_session: outbound_rx,
        });

        Ok(Connection {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}

impl ServerLink {
    /// Inject a parsed server message into the session.
    pub async fn send_message(&self, json: &str) {
        let msg = virgil_voice::ws::parse_server_message(json).expect("test message must parse");
        self.to_session
            .send(TransportEvent::Message(msg))
            .await
            .expect("session inbound loop is gone");
    }

    pub async fn close(&self, normal: bool) {
        let _ = self
            .to_session
            .send(TransportEvent::Closed { normal })
            .await;
    }

    pub async fn recv_frame(&mut self) -> OutboundFrame {
        tokio::time::timeout(Duration::from_secs(2), self.from_session.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("outbound channel closed")
    }
}

// ── Capture backend ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CaptureProbe {
    pub deny: Arc<AtomicBool>,
    pub capturing: Arc<AtomicBool>,
    frame_tx: Arc<StdMutex<Option<mpsc::Sender<AudioFrame>>>>,
}

impl CaptureProbe {
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Push one captured frame into the live episode.
    pub async fn send_frame(&self, samples: Vec<i16>, timestamp_ms: u64) {
        let tx = self
            .frame_tx
            .lock()
            .unwrap()
            .clone()
            .expect("capture is not running");
        tx.send(AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        })
        .await
        .expect("capture loop is gone");
    }
}

pub struct FakeCapture {
    probe: CaptureProbe,
}

impl FakeCapture {
    pub fn new() -> (Self, CaptureProbe) {
        let probe = CaptureProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FakeCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, VoiceError> {
        if self.probe.deny.load(Ordering::SeqCst) {
            return Err(VoiceError::PermissionDenied("denied by test".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.probe.frame_tx.lock().unwrap() = Some(tx);
        self.probe.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.probe.frame_tx.lock().unwrap().take();
        self.probe.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.probe.is_capturing()
    }

    fn name(&self) -> &str {
        "fake-capture"
    }
}

// ── Player ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct PlayerProbe {
    pub plays: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub last: Arc<StdMutex<Option<ReplyAudio>>>,
    done_tx: Arc<StdMutex<Option<oneshot::Sender<()>>>>,
}

impl PlayerProbe {
    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    /// Let the current playback run to its natural end.
    pub fn finish_playback(&self) {
        if let Some(tx) = self.done_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

pub struct FakePlayer {
    probe: PlayerProbe,
}

impl FakePlayer {
    pub fn new() -> (Self, PlayerProbe) {
        let probe = PlayerProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait::async_trait]
impl Player for FakePlayer {
    async fn play(&mut self, audio: ReplyAudio) -> Result<oneshot::Receiver<()>, VoiceError> {
        self.probe.plays.fetch_add(1, Ordering::SeqCst);
        *self.probe.last.lock().unwrap() = Some(audio);
        let (tx, rx) = oneshot::channel();
        // Starting anew releases the prior sink.
        *self.probe.done_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.probe.done_tx.lock().unwrap().take();
    }

    fn is_playing(&self) -> bool {
        self.probe.done_tx.lock().unwrap().is_some()
    }

    fn name(&self) -> &str {
        "fake-player"
    }
}

// ── Fallback speech ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecognizerProbe {
    pub listening: Arc<AtomicBool>,
    pub final_transcript: Arc<StdMutex<Option<String>>>,
    line_tx: Arc<StdMutex<Option<mpsc::Sender<String>>>>,
}

impl RecognizerProbe {
    pub fn script_transcript(&self, text: &str) {
        *self.final_transcript.lock().unwrap() = Some(text.to_string());
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

pub struct FakeRecognizer {
    probe: RecognizerProbe,
}

impl FakeRecognizer {
    pub fn new() -> (Self, RecognizerProbe) {
        let probe = RecognizerProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait::async_trait]
impl Recognizer for FakeRecognizer {
    async fn start(&mut self) -> Result<mpsc::Receiver<String>, VoiceError> {
        let (tx, rx) = mpsc::channel(16);
        *self.probe.line_tx.lock().unwrap() = Some(tx);
        self.probe.listening.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<Option<String>> {
        self.probe.line_tx.lock().unwrap().take();
        self.probe.listening.store(false, Ordering::SeqCst);
        Ok(self.probe.final_transcript.lock().unwrap().take())
    }

    fn is_listening(&self) -> bool {
        self.probe.is_listening()
    }
}

#[derive(Clone, Default)]
pub struct SynthesizerProbe {
    pub spoken: Arc<StdMutex<Vec<String>>>,
    pub speaking: Arc<AtomicBool>,
}

pub struct FakeSynthesizer {
    probe: SynthesizerProbe,
}

impl FakeSynthesizer {
    pub fn new() -> (Self, SynthesizerProbe) {
        let probe = SynthesizerProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait::async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
        self.probe.spoken.lock().unwrap().push(text.to_string());
        self.probe.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.probe.speaking.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.probe.speaking.load(Ordering::SeqCst)
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub session: VoiceSession,
    pub events: mpsc::Receiver<SessionEvent>,
    pub transport: Arc<FakeTransport>,
    pub capture: CaptureProbe,
    pub player: PlayerProbe,
    pub recognizer: Option<RecognizerProbe>,
    pub synthesizer: SynthesizerProbe,
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        backend_origin: "http://localhost:8000".to_string(),
        reconnect_delay: Duration::from_secs(2),
        capture: CaptureConfig::default(),
    }
}

fn report_for(capability: Capability, recognition: bool) -> CapabilityReport {
    CapabilityReport {
        capture_device: capability == Capability::StreamingCapable,
        playback_device: capability == Capability::StreamingCapable,
        native_recognition: recognition,
        native_synthesis: true,
    }
}

pub fn harness(capability: Capability, with_recognizer: bool) -> Harness {
    let transport = FakeTransport::new();
    let (capture, capture_probe) = FakeCapture::new();
    let (player, player_probe) = FakePlayer::new();
    let (synthesizer, synthesizer_probe) = FakeSynthesizer::new();

    let (recognizer, recognizer_probe) = if with_recognizer {
        let (r, p) = FakeRecognizer::new();
        (
            Some(Box::new(r) as Box<dyn Recognizer>),
            Some(p),
        )
    } else {
        (None, None)
    };

    let parts = SessionParts {
        transport: transport.clone(),
        capture: Box::new(capture),
        player: Box::new(player),
        recognizer,
        synthesizer: Some(Box::new(synthesizer)),
    };

    let (session, events) = VoiceSession::new(
        session_config(),
        capability,
        report_for(capability, with_recognizer),
        parts,
    );

    Harness {
        session,
        events,
        transport,
        capture: capture_probe,
        player: player_probe,
        recognizer: recognizer_probe,
        synthesizer: synthesizer_probe,
    }
}

// ── Event helpers ──────────────────────────────────────────────────

/// Wait (bounded) for the first event matching the predicate, discarding
/// everything before it.
pub async fn wait_for_event<F>(
    events: &mut mpsc::Receiver<SessionEvent>,
    mut pred: F,
) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return event;
            }
        }
        panic!("event channel closed before a matching event arrived");
    })
    .await
    .expect("timed out waiting for a session event")
}

/// Drain everything currently queued on the event channel.
pub fn drain_events(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
