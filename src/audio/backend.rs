use anyhow::Result;
use tokio::sync::mpsc;

use crate::error::VoiceError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Peak amplitude of this frame, normalized to 0.0..=1.0.
    ///
    /// Feeds the level meter; cosmetic only, never part of the wire payload.
    pub fn peak_level(&self) -> f32 {
        self.samples
            .iter()
            .map(|s| (*s as i32).unsigned_abs())
            .max()
            .map(|peak| peak as f32 / i16::MAX as f32)
            .unwrap_or(0.0)
            .min(1.0)
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (backend resamples or errors if unsupported)
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
    /// Frame duration in milliseconds (affects latency)
    pub frame_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
        }
    }
}

/// Microphone capture backend trait
///
/// The production implementation opens the host's default input device via
/// cpal. Tests substitute a scripted fake. The device handle is held for the
/// duration of one recording episode: acquired in `start`, released in
/// `stop` (or on drop, so an error path cannot leak it).
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio.
    ///
    /// Returns a channel receiver of captured frames. A denied or missing
    /// device surfaces as `VoiceError::PermissionDenied`.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, VoiceError>;

    /// Stop capturing and release the device handle.
    async fn stop(&mut self) -> Result<()>;

    /// Whether the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}
