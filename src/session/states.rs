// Session state machine.
//
// The four lifecycle enums live together in one struct and every transition
// goes through a guard method here; call sites never flip fields ad hoc.
// Illegal transitions come back as `VoiceError::InvalidState` and leave the
// state untouched.

use serde::Serialize;

use crate::error::VoiceError;

/// Lifecycle of the streaming transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Microphone capture lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Requesting,
    Recording,
}

/// Synthesized-reply playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Native-recognition lifecycle; `Unavailable` when the host has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackState {
    Unavailable,
    Idle,
    Listening,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionState {
    pub connection: ConnectionState,
    pub capture: CaptureState,
    pub playback: PlaybackState,
    pub fallback: FallbackState,
}

impl SessionState {
    pub fn new(fallback_available: bool) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            capture: CaptureState::Idle,
            playback: PlaybackState::Idle,
            fallback: if fallback_available {
                FallbackState::Idle
            } else {
                FallbackState::Unavailable
            },
        }
    }

    // ── Connection ────────────────────────────────────────────────

    /// Enter Connecting. A no-op error while an attempt is outstanding or
    /// the socket is already up keeps connect attempts serialized.
    pub fn begin_connect(&mut self) -> Result<(), VoiceError> {
        match self.connection {
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                self.connection = ConnectionState::Connecting;
                Ok(())
            }
            ConnectionState::Connecting => Err(VoiceError::InvalidState(
                "a connect attempt is already outstanding",
            )),
            ConnectionState::Connected => {
                Err(VoiceError::InvalidState("already connected"))
            }
        }
    }

    pub fn mark_connected(&mut self) {
        self.connection = ConnectionState::Connected;
    }

    pub fn mark_disconnected(&mut self) {
        self.connection = ConnectionState::Disconnected;
    }

    /// Abnormal closure. Reconnecting is only entered from Connected; an
    /// abnormal close in any other state reports whether a reconnect should
    /// be scheduled.
    pub fn connection_lost(&mut self) -> bool {
        if self.connection == ConnectionState::Connected {
            self.connection = ConnectionState::Reconnecting;
            true
        } else {
            false
        }
    }

    // ── Capture ───────────────────────────────────────────────────

    /// Guard shared by both capture paths: capture is single-entry and
    /// mutually exclusive with playback and with fallback listening.
    fn check_capture_free(&self) -> Result<(), VoiceError> {
        if self.playback == PlaybackState::Playing {
            return Err(VoiceError::InvalidState(
                "stop playback before recording",
            ));
        }
        if self.capture != CaptureState::Idle {
            return Err(VoiceError::InvalidState("capture already in progress"));
        }
        if self.fallback == FallbackState::Listening {
            return Err(VoiceError::InvalidState(
                "native recognition is already listening",
            ));
        }
        Ok(())
    }

    /// Enter Requesting (microphone permission prompt outstanding).
    pub fn begin_capture_request(&mut self) -> Result<(), VoiceError> {
        self.check_capture_free()?;
        self.capture = CaptureState::Requesting;
        Ok(())
    }

    pub fn mark_recording(&mut self) {
        self.capture = CaptureState::Recording;
    }

    pub fn capture_idle(&mut self) {
        self.capture = CaptureState::Idle;
    }

    /// Enter fallback listening.
    pub fn begin_listening(&mut self) -> Result<(), VoiceError> {
        if self.fallback == FallbackState::Unavailable {
            return Err(VoiceError::NoInputMethod);
        }
        self.check_capture_free()?;
        self.fallback = FallbackState::Listening;
        Ok(())
    }

    pub fn listening_done(&mut self) {
        if self.fallback == FallbackState::Listening {
            self.fallback = FallbackState::Idle;
        }
    }

    // ── Playback ──────────────────────────────────────────────────

    /// Enter Playing. Recording blocks playback; a prior playback does not
    /// (the caller stops and releases it first).
    pub fn begin_playback(&mut self) -> Result<(), VoiceError> {
        if self.capture == CaptureState::Recording {
            return Err(VoiceError::InvalidState(
                "cannot play a reply while recording",
            ));
        }
        self.playback = PlaybackState::Playing;
        Ok(())
    }

    pub fn playback_idle(&mut self) {
        self.playback = PlaybackState::Idle;
    }
}
