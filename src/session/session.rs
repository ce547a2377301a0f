use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::events::SessionEvent;
use super::states::{CaptureState, ConnectionState, FallbackState, SessionState};
use super::stats::{ConversationEntry, Role, SessionStats};
use crate::audio::{assemble_wav, decode_reply, AudioFrame, CaptureBackend, LevelMeter, Player};
use crate::capability::{Capability, CapabilityReport};
use crate::error::VoiceError;
use crate::speech::{is_meaningful, Recognizer, Synthesizer};
use crate::ws::{OutboundFrame, ServerMessage, TextInputMessage, Transport, TransportEvent, UtteranceResponse};

/// External collaborators behind the session's seams. Production wiring uses
/// cpal/rodio/tungstenite/subprocess implementations; tests inject fakes.
pub struct SessionParts {
    pub transport: Arc<dyn Transport>,
    pub capture: Box<dyn CaptureBackend>,
    pub player: Box<dyn Player>,
    pub recognizer: Option<Box<dyn Recognizer>>,
    pub synthesizer: Option<Box<dyn Synthesizer>>,
}

/// One real-time voice interaction surface.
///
/// Owns every external handle involved in a voice exchange: the microphone
/// backend, the streaming connection, the playback sink, the native-speech
/// subprocesses, and the single-slot reconnect timer. They are exposed them only
/// through the operations below. Each acquisition has a matching release on
/// the stop, error, and teardown paths.
///
/// All user-visible effects flow out through the [`SessionEvent`] channel
/// handed back by [`VoiceSession::new`].
#[derive(Clone)]
pub struct VoiceSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    capability: Capability,
    report: CapabilityReport,

    /// The four lifecycle enums; transitions enforced in `states.rs`.
    state: Mutex<SessionState>,

    transport: Arc<dyn Transport>,
    capture: Mutex<Box<dyn CaptureBackend>>,
    player: Mutex<Box<dyn Player>>,
    recognizer: Option<Mutex<Box<dyn Recognizer>>>,
    synthesizer: Option<Mutex<Box<dyn Synthesizer>>>,

    /// Write half of the live connection; absent while disconnected.
    outbound: Mutex<Option<mpsc::Sender<OutboundFrame>>>,

    /// Task handles, one slot each. The reconnect slot doubles as the
    /// "is a reconnect already pending" query.
    inbound_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
    fallback_task: Mutex<Option<JoinHandle<()>>>,
    playback_task: Mutex<Option<JoinHandle<()>>>,

    /// Frames buffered during the current recording episode; drained exactly
    /// once, inside the stop handler.
    pending_frames: Mutex<Vec<AudioFrame>>,
    level: Mutex<LevelMeter>,

    /// Most recent recognized/transcribed utterance (overwritten per turn).
    transcript: Mutex<Option<String>>,
    conversation: Mutex<Vec<ConversationEntry>>,

    /// Single-in-flight gate: capture and typed input are rejected while an
    /// utterance awaits its response, so replies cannot be misattributed.
    awaiting_response: AtomicBool,

    /// Invalidates stale playback watchers when playback is restarted.
    playback_generation: AtomicU64,

    utterances_sent: AtomicUsize,
    responses_received: AtomicUsize,
    started_at: DateTime<Utc>,

    event_tx: mpsc::Sender<SessionEvent>,
}

impl VoiceSession {
    pub fn new(
        config: SessionConfig,
        capability: Capability,
        report: CapabilityReport,
        parts: SessionParts,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);

        let fallback_available = parts.recognizer.is_some();
        let session = Self {
            inner: Arc::new(Inner {
                config,
                capability,
                report,
                state: Mutex::new(SessionState::new(fallback_available)),
                transport: parts.transport,
                capture: Mutex::new(parts.capture),
                player: Mutex::new(parts.player),
                recognizer: parts.recognizer.map(Mutex::new),
                synthesizer: parts.synthesizer.map(Mutex::new),
                outbound: Mutex::new(None),
                inbound_task: Mutex::new(None),
                reconnect_task: Mutex::new(None),
                capture_task: Mutex::new(None),
                fallback_task: Mutex::new(None),
                playback_task: Mutex::new(None),
                pending_frames: Mutex::new(Vec::new()),
                level: Mutex::new(LevelMeter::new()),
                transcript: Mutex::new(None),
                conversation: Mutex::new(Vec::new()),
                awaiting_response: AtomicBool::new(false),
                playback_generation: AtomicU64::new(0),
                utterances_sent: AtomicUsize::new(0),
                responses_received: AtomicUsize::new(0),
                started_at: Utc::now(),
                event_tx,
            }),
        };

        if capability == Capability::Unsupported {
            info!("Voice session created in unsupported mode");
        }

        (session, event_rx)
    }

    pub fn session_id(&self) -> &str {
        &self.inner.config.session_id
    }

    pub fn capability(&self) -> Capability {
        self.inner.capability
    }

    pub fn capability_report(&self) -> CapabilityReport {
        self.inner.report.clone()
    }

    // ── Event plumbing ────────────────────────────────────────────

    /// Events never block protocol work: a slow or absent consumer costs
    /// dropped events, not a stuck session.
    fn emit(&self, event: SessionEvent) {
        if self.inner.event_tx.try_send(event).is_err() {
            debug!("Dropping session event: receiver slow or gone");
        }
    }

    fn emit_status(&self, line: impl Into<String>) {
        self.emit(SessionEvent::Status { line: line.into() });
    }

    fn emit_error(&self, err: &VoiceError) {
        self.emit(SessionEvent::Error {
            message: err.to_string(),
        });
    }

    // ── Connect ───────────────────────────────────────────────────

    /// Open the streaming connection for this session's identifier.
    ///
    /// A no-op while an attempt is outstanding or the socket is already up,
    /// so concurrent triggers (user, reconnect timer, send-failure recovery)
    /// stay serialized.
    //
    // Returns a boxed future rather than using `async fn`: this method
    // participates in a recursive async cycle (connect → inbound_loop →
    // handle_close → schedule_reconnect → connect), and a concrete return type
    // gives the compiler something it can resolve `Send` for without trying to
    // reveal an opaque type inside its own defining scope. Callers still
    // `connect().await` unchanged.
    pub fn connect(&self) -> Pin<Box<dyn Future<Output = Result<(), VoiceError>> + Send + '_>> {
        Box::pin(async move {
            match self.inner.capability {
                Capability::Unsupported => {
                    let err = VoiceError::CapabilityUnsupported;
                    self.emit_error(&err);
                    return Err(err);
                }
                Capability::FallbackOnly => {
                    debug!("Streaming unavailable; connect is a no-op in fallback mode");
                    return Ok(());
                }
                Capability::StreamingCapable => {}
            }

            {
                let mut state = self.inner.state.lock().await;
                if state.begin_connect().is_err() {
                    debug!("Connect skipped: attempt outstanding or already connected");
                    return Ok(());
                }
            }

            self.emit_status("Connecting to the voice service...");
            let url = self.inner.config.endpoint();

            match self.inner.transport.connect(&url).await {
                Ok(connection) => {
                    *self.inner.outbound.lock().await = Some(connection.outbound);
                    self.inner.state.lock().await.mark_connected();
                    self.emit_status("Connected to the voice service");

                    let session = self.clone();
                    let events = connection.events;
                    let handle = tokio::spawn(async move { session.inbound_loop(events).await });
                    if let Some(old) = self.inner.inbound_task.lock().await.replace(handle) {
                        old.abort();
                    }
                    Ok(())
                }
                Err(e) => {
                    self.inner.state.lock().await.mark_disconnected();
                    warn!("Connect failed: {:#}", e);
                    let err = VoiceError::ConnectionLost;
                    self.emit_error(&err);
                    Err(err)
                }
            }
        })
    }

    async fn inbound_loop(self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(msg) => self.handle_server_message(msg).await,
                TransportEvent::Closed { normal } => {
                    self.handle_close(normal).await;
                    return;
                }
            }
        }
        // Transport dropped without a close notice: treat as abnormal.
        self.handle_close(false).await;
    }

    async fn handle_server_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Status { status, message } => {
                if status == "processing" {
                    self.emit(SessionEvent::Thinking);
                } else {
                    self.emit_status(message.unwrap_or(status));
                }
            }
            ServerMessage::Response(response) => self.handle_response(response).await,
            ServerMessage::Error { error } => {
                self.inner.awaiting_response.store(false, Ordering::SeqCst);
                self.emit_error(&VoiceError::ServerError(error));
            }
        }
    }

    async fn handle_response(&self, response: UtteranceResponse) {
        self.inner.awaiting_response.store(false, Ordering::SeqCst);
        self.inner.responses_received.fetch_add(1, Ordering::SeqCst);

        if let Some(timing) = &response.processing_time {
            debug!("Backend timing: {}", timing);
        }

        if let Some(transcription) = &response.transcription {
            *self.inner.transcript.lock().await = Some(transcription.clone());
            self.inner
                .conversation
                .lock()
                .await
                .push(ConversationEntry::new(Role::User, transcription.clone()));
        }
        self.inner
            .conversation
            .lock()
            .await
            .push(ConversationEntry::new(Role::Assistant, response.response.clone()));

        let has_audio = response.audio.is_some();
        self.emit(SessionEvent::Utterance {
            transcript: response.transcription.clone(),
            reply: response.response.clone(),
            has_audio,
        });

        if let Some(audio) = &response.audio {
            if let Err(e) = self.play_response(audio, response.sample_rate).await {
                debug!("Reply playback not started: {}", e);
            }
        }
    }

    async fn handle_close(&self, normal: bool) {
        *self.inner.outbound.lock().await = None;
        // Any in-flight utterance died with the socket; unblock the mic.
        self.inner.awaiting_response.store(false, Ordering::SeqCst);

        if normal {
            self.inner.state.lock().await.mark_disconnected();
            debug!("Connection closed normally");
            return;
        }

        let should_reconnect = self.inner.state.lock().await.connection_lost();
        if should_reconnect {
            self.emit_status("Lost connection to the voice service; reconnecting...");
            self.schedule_reconnect().await;
        } else {
            debug!("Abnormal close outside Connected; no reconnect scheduled");
        }
    }

    /// Schedule the single reconnect attempt. The slot holds at most one
    /// pending timer; scheduling while one is outstanding is a no-op.
    async fn schedule_reconnect(&self) {
        let mut slot = self.inner.reconnect_task.lock().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                debug!("Reconnect already pending; not scheduling another");
                return;
            }
        }

        let session = self.clone();
        let delay = self.inner.config.reconnect_delay;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = session.connect().await {
                debug!("Scheduled reconnect failed: {}", e);
            }
        }));
    }

    // ── Capture ───────────────────────────────────────────────────

    /// Begin one utterance: microphone capture when streaming is up, native
    /// recognition otherwise.
    pub async fn start_capture(&self) -> Result<(), VoiceError> {
        if self.inner.capability == Capability::Unsupported {
            let err = VoiceError::CapabilityUnsupported;
            self.emit_error(&err);
            return Err(err);
        }

        if self.inner.awaiting_response.load(Ordering::SeqCst) {
            let err = VoiceError::InvalidState("still waiting for the previous reply");
            self.emit_error(&err);
            return Err(err);
        }

        let connected = {
            self.inner.state.lock().await.connection == ConnectionState::Connected
        };

        if self.inner.capability == Capability::StreamingCapable && connected {
            self.start_recording().await
        } else if self.inner.recognizer.is_some() {
            // True fallback: streaming is attempted first whenever possible.
            self.start_listening().await
        } else {
            let err = VoiceError::NoInputMethod;
            self.emit_error(&err);
            Err(err)
        }
    }

    async fn start_recording(&self) -> Result<(), VoiceError> {
        {
            let mut state = self.inner.state.lock().await;
            state.begin_capture_request().map_err(|e| {
                self.emit_error(&e);
                e
            })?;
        }

        let started = {
            let mut capture = self.inner.capture.lock().await;
            capture.start().await
        };

        match started {
            Ok(frames) => {
                self.inner.state.lock().await.mark_recording();
                self.emit_status("Listening...");

                let session = self.clone();
                let handle = tokio::spawn(async move { session.capture_loop(frames).await });
                if let Some(old) = self.inner.capture_task.lock().await.replace(handle) {
                    old.abort();
                }
                Ok(())
            }
            Err(e) => {
                // The mic control must never stay stuck in a recording state
                // after a failed start.
                self.inner.state.lock().await.capture_idle();
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    async fn capture_loop(self, mut frames: mpsc::Receiver<AudioFrame>) {
        while let Some(frame) = frames.recv().await {
            let readings = {
                let mut meter = self.inner.level.lock().await;
                meter.record(frame.peak_level());
                meter.readings()
            };
            self.emit(SessionEvent::Level { readings });
            self.inner.pending_frames.lock().await.push(frame);
        }
        debug!("Capture stream drained");
    }

    async fn start_listening(&self) -> Result<(), VoiceError> {
        let recognizer = self
            .inner
            .recognizer
            .as_ref()
            .ok_or(VoiceError::NoInputMethod)?;

        {
            let mut state = self.inner.state.lock().await;
            state.begin_listening().map_err(|e| {
                self.emit_error(&e);
                e
            })?;
        }

        let started = recognizer.lock().await.start().await;
        match started {
            Ok(mut lines) => {
                self.emit_status("Listening (native recognition)...");
                let session = self.clone();
                let handle = tokio::spawn(async move {
                    // Interim results refresh the latest-utterance buffer as
                    // they arrive; the completed utterance is emitted on stop.
                    while let Some(line) = lines.recv().await {
                        *session.inner.transcript.lock().await = Some(line);
                    }
                });
                if let Some(old) = self.inner.fallback_task.lock().await.replace(handle) {
                    old.abort();
                }
                Ok(())
            }
            Err(e) => {
                self.inner.state.lock().await.listening_done();
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Finish the current utterance on whichever capture path is active.
    pub async fn stop_capture(&self) -> Result<(), VoiceError> {
        let (recording, listening) = {
            let state = self.inner.state.lock().await;
            (
                state.capture == CaptureState::Recording,
                state.fallback == FallbackState::Listening,
            )
        };

        if recording {
            self.finish_recording().await
        } else if listening {
            self.finish_listening().await
        } else {
            Err(VoiceError::InvalidState("no capture in progress"))
        }
    }

    async fn finish_recording(&self) -> Result<(), VoiceError> {
        // Stop the device first so the frame stream ends, then wait for the
        // capture task to flush everything it had in flight.
        {
            let mut capture = self.inner.capture.lock().await;
            if let Err(e) = capture.stop().await {
                warn!("Capture backend stop failed: {:#}", e);
            }
        }
        if let Some(task) = self.inner.capture_task.lock().await.take() {
            let _ = task.await;
        }
        self.inner.level.lock().await.reset();

        // The episode buffer is drained exactly once, here.
        let frames = std::mem::take(&mut *self.inner.pending_frames.lock().await);
        self.inner.state.lock().await.capture_idle();

        let payload = match assemble_wav(frames) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.emit_status("Nothing captured");
                return Ok(());
            }
            Err(e) => {
                let err = VoiceError::SendFailure(format!("payload assembly failed: {e:#}"));
                self.emit_error(&err);
                return Err(err);
            }
        };

        let sender = self.inner.outbound.lock().await.clone();
        let connected =
            self.inner.state.lock().await.connection == ConnectionState::Connected;

        match (connected, sender) {
            (true, Some(tx)) => {
                if tx.send(OutboundFrame::Audio(payload)).await.is_ok() {
                    self.inner.awaiting_response.store(true, Ordering::SeqCst);
                    self.inner.utterances_sent.fetch_add(1, Ordering::SeqCst);
                    self.emit(SessionEvent::Thinking);
                    Ok(())
                } else {
                    self.send_failed("the connection dropped mid-send").await
                }
            }
            _ => self.send_failed("not connected to the voice service").await,
        }
    }

    /// Send failure: the episode's audio is dropped (never retried) and a
    /// connect attempt is triggered for the next utterance.
    async fn send_failed(&self, reason: &str) -> Result<(), VoiceError> {
        let err = VoiceError::SendFailure(reason.to_string());
        self.emit_error(&err);

        let session = self.clone();
        tokio::spawn(async move {
            let _ = session.connect().await;
        });

        Err(err)
    }

    async fn finish_listening(&self) -> Result<(), VoiceError> {
        let recognizer = self
            .inner
            .recognizer
            .as_ref()
            .ok_or(VoiceError::NoInputMethod)?;

        let transcript = recognizer.lock().await.stop().await;
        if let Some(task) = self.inner.fallback_task.lock().await.take() {
            let _ = task.await;
        }
        self.inner.state.lock().await.listening_done();

        match transcript {
            Ok(Some(text)) if is_meaningful(&text) => {
                *self.inner.transcript.lock().await = Some(text.clone());
                self.inner
                    .conversation
                    .lock()
                    .await
                    .push(ConversationEntry::new(Role::User, text.clone()));
                self.emit(SessionEvent::Recognized { text });
                Ok(())
            }
            Ok(_) => {
                self.emit_status("Didn't catch that, try again");
                Ok(())
            }
            Err(e) => {
                warn!("Recognizer stop failed: {:#}", e);
                self.emit_status("Didn't catch that, try again");
                Ok(())
            }
        }
    }

    // ── Typed input ───────────────────────────────────────────────

    /// Send a typed utterance over the streaming connection.
    pub async fn send_text(&self, text: &str) -> Result<(), VoiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::InvalidState("empty message"));
        }

        if self.inner.awaiting_response.load(Ordering::SeqCst) {
            let err = VoiceError::InvalidState("still waiting for the previous reply");
            self.emit_error(&err);
            return Err(err);
        }

        let sender = self.inner.outbound.lock().await.clone();
        let connected =
            self.inner.state.lock().await.connection == ConnectionState::Connected;

        match (connected, sender) {
            (true, Some(tx)) => {
                let json = serde_json::to_string(&TextInputMessage::new(text))
                    .map_err(|e| VoiceError::SendFailure(e.to_string()))?;
                if tx.send(OutboundFrame::Text(json)).await.is_ok() {
                    self.inner.awaiting_response.store(true, Ordering::SeqCst);
                    self.inner
                        .conversation
                        .lock()
                        .await
                        .push(ConversationEntry::new(Role::User, text));
                    self.emit(SessionEvent::Thinking);
                    Ok(())
                } else {
                    self.send_failed("the connection dropped mid-send").await
                }
            }
            _ => self.send_failed("not connected to the voice service").await,
        }
    }

    // ── Playback ──────────────────────────────────────────────────

    /// Decode and play a synthesized reply. A playback already in progress
    /// is stopped and released first; recording blocks playback entirely.
    pub async fn play_response(
        &self,
        audio_b64: &str,
        sample_rate: Option<u32>,
    ) -> Result<(), VoiceError> {
        {
            let mut state = self.inner.state.lock().await;
            state.begin_playback().map_err(|e| {
                self.emit_error(&e);
                e
            })?;
        }

        // Read-aloud and decoded playback are mutually exclusive.
        if let Some(synth) = &self.inner.synthesizer {
            let _ = synth.lock().await.stop().await;
        }

        let generation = self
            .inner
            .playback_generation
            .fetch_add(1, Ordering::SeqCst)
            + 1;

        let audio = match decode_reply(audio_b64, sample_rate) {
            Ok(audio) => audio,
            Err(e) => {
                self.inner.state.lock().await.playback_idle();
                self.emit_error(&e);
                return Err(e);
            }
        };

        let started = {
            let mut player = self.inner.player.lock().await;
            player.play(audio).await
        };

        match started {
            Ok(done) => {
                let session = self.clone();
                let watcher = tokio::spawn(async move {
                    let natural = done.await.is_ok();
                    // A newer playback owns the state now; leave it alone.
                    if session.inner.playback_generation.load(Ordering::SeqCst) == generation {
                        session.inner.state.lock().await.playback_idle();
                        if natural {
                            debug!("Reply playback finished");
                        }
                    }
                });
                if let Some(old) = self.inner.playback_task.lock().await.replace(watcher) {
                    old.abort();
                }
                Ok(())
            }
            Err(e) => {
                self.inner.state.lock().await.playback_idle();
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Stop decoded playback and any read-aloud speech; always lands in Idle.
    pub async fn stop_playback(&self) {
        {
            let mut player = self.inner.player.lock().await;
            player.stop().await;
        }
        if let Some(synth) = &self.inner.synthesizer {
            if let Err(e) = synth.lock().await.stop().await {
                warn!("Synthesizer stop failed: {:#}", e);
            }
        }
        self.inner.playback_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().await.playback_idle();
    }

    /// Read the last reply aloud through the native synthesizer.
    pub async fn speak_last_reply(&self) -> Result<(), VoiceError> {
        let Some(synth) = &self.inner.synthesizer else {
            let err = VoiceError::PlaybackFailure("no native synthesizer available".to_string());
            self.emit_error(&err);
            return Err(err);
        };

        let reply = {
            let conversation = self.inner.conversation.lock().await;
            conversation
                .iter()
                .rev()
                .find(|e| e.role == Role::Assistant)
                .map(|e| e.text.clone())
        };
        let Some(reply) = reply else {
            let err = VoiceError::InvalidState("no reply to read yet");
            self.emit_error(&err);
            return Err(err);
        };

        // Mutually exclusive with decoded-audio playback.
        {
            let mut player = self.inner.player.lock().await;
            player.stop().await;
        }
        self.inner.playback_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().await.playback_idle();

        synth.lock().await.speak(&reply).await.map_err(|e| {
            self.emit_error(&e);
            e
        })
    }

    // ── Introspection ─────────────────────────────────────────────

    pub async fn stats(&self) -> SessionStats {
        let state = *self.inner.state.lock().await;
        let uptime = Utc::now().signed_duration_since(self.inner.started_at);
        SessionStats {
            session_id: self.inner.config.session_id.clone(),
            state,
            started_at: self.inner.started_at,
            uptime_secs: uptime.num_milliseconds() as f64 / 1000.0,
            utterances_sent: self.inner.utterances_sent.load(Ordering::SeqCst),
            responses_received: self.inner.responses_received.load(Ordering::SeqCst),
            awaiting_response: self.inner.awaiting_response.load(Ordering::SeqCst),
        }
    }

    /// Most recent recognized/transcribed utterance.
    pub async fn latest_transcript(&self) -> Option<String> {
        self.inner.transcript.lock().await.clone()
    }

    /// Accumulated conversation, oldest first.
    pub async fn conversation(&self) -> Vec<ConversationEntry> {
        self.inner.conversation.lock().await.clone()
    }

    /// Frames buffered for the in-progress recording episode. Outside an
    /// episode this is always zero: the buffer drains inside the stop
    /// handler.
    pub async fn pending_frame_count(&self) -> usize {
        self.inner.pending_frames.lock().await.len()
    }

    // ── Teardown ──────────────────────────────────────────────────

    /// Release everything: capture device, recognizer, reconnect timer,
    /// streaming connection (normal close), playback sink, synthesizer.
    /// Every release runs even when several resources are mid-flight.
    pub async fn teardown(&self) {
        info!("Tearing down voice session {}", self.inner.config.session_id);

        {
            let mut capture = self.inner.capture.lock().await;
            if capture.is_capturing() {
                if let Err(e) = capture.stop().await {
                    warn!("Capture stop during teardown failed: {:#}", e);
                }
            }
        }
        if let Some(task) = self.inner.capture_task.lock().await.take() {
            task.abort();
        }
        self.inner.pending_frames.lock().await.clear();
        self.inner.level.lock().await.reset();

        if let Some(recognizer) = &self.inner.recognizer {
            let mut recognizer = recognizer.lock().await;
            if recognizer.is_listening() {
                let _ = recognizer.stop().await;
            }
        }
        if let Some(task) = self.inner.fallback_task.lock().await.take() {
            task.abort();
        }

        if let Some(timer) = self.inner.reconnect_task.lock().await.take() {
            timer.abort();
        }

        if let Some(tx) = self.inner.outbound.lock().await.take() {
            let _ = tx.send(OutboundFrame::Close).await;
        }
        if let Some(task) = self.inner.inbound_task.lock().await.take() {
            task.abort();
        }

        {
            let mut player = self.inner.player.lock().await;
            player.stop().await;
        }
        if let Some(synth) = &self.inner.synthesizer {
            let _ = synth.lock().await.stop().await;
        }
        if let Some(task) = self.inner.playback_task.lock().await.take() {
            task.abort();
        }

        self.inner.awaiting_response.store(false, Ordering::SeqCst);
        let mut state = self.inner.state.lock().await;
        state.capture_idle();
        state.listening_done();
        state.playback_idle();
        state.mark_disconnected();
    }
}
