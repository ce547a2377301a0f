// Host capability detection.
//
// Probed once when the session is created. Streaming needs a capture device
// and a playback device; the fallback needs at least the recognizer command.
// Neither probe opens a connection; socket reachability is a runtime
// concern handled by connect/reconnect, not a capability.

use tracing::info;

use crate::audio::{MicrophoneBackend, RodioPlayer};
use crate::config::FallbackConfig;
use crate::speech;

/// What this host can do for voice I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Microphone + playback devices present: full streaming path.
    StreamingCapable,
    /// No streaming devices, but native recognition exists.
    FallbackOnly,
    /// Neither path available. Terminal: the session refuses all operations.
    Unsupported,
}

/// Individual probe results, kept for logging and the status endpoint.
#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub capture_device: bool,
    pub playback_device: bool,
    pub native_recognition: bool,
    pub native_synthesis: bool,
}

impl CapabilityReport {
    pub fn probe(fallback: &FallbackConfig) -> Self {
        Self {
            capture_device: MicrophoneBackend::device_available(),
            playback_device: RodioPlayer::device_available(),
            native_recognition: fallback
                .recognizer_command
                .as_deref()
                .map(speech::command_available)
                .unwrap_or(false),
            native_synthesis: fallback
                .synthesizer_command
                .as_deref()
                .map(speech::command_available)
                .unwrap_or(false),
        }
    }

    /// Streaming is preferred whenever the devices exist; native recognition
    /// is a true fallback, not a peer.
    pub fn classify(&self) -> Capability {
        let capability = if self.capture_device && self.playback_device {
            Capability::StreamingCapable
        } else if self.native_recognition {
            Capability::FallbackOnly
        } else {
            Capability::Unsupported
        };

        info!(
            "Voice capability: {:?} (capture={}, playback={}, recognition={}, synthesis={})",
            capability,
            self.capture_device,
            self.playback_device,
            self.native_recognition,
            self.native_synthesis
        );

        capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(capture: bool, playback: bool, recognition: bool) -> CapabilityReport {
        CapabilityReport {
            capture_device: capture,
            playback_device: playback,
            native_recognition: recognition,
            native_synthesis: false,
        }
    }

    #[test]
    fn devices_mean_streaming() {
        assert_eq!(report(true, true, true).classify(), Capability::StreamingCapable);
        assert_eq!(report(true, true, false).classify(), Capability::StreamingCapable);
    }

    #[test]
    fn recognition_alone_means_fallback() {
        assert_eq!(report(false, false, true).classify(), Capability::FallbackOnly);
        assert_eq!(report(true, false, true).classify(), Capability::FallbackOnly);
    }

    #[test]
    fn nothing_means_unsupported() {
        assert_eq!(report(false, false, false).classify(), Capability::Unsupported);
    }
}
