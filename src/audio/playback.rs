// Synthesized-reply playback.
//
// Replies arrive as base64 audio, normally a WAV container, occasionally raw
// PCM16 plus an explicit sample rate. rodio owns the output device; the
// output stream is not Send, so each playback runs on its own worker thread
// holding the sink until the audio ends or the session stops it. Only one
// sink is ever live: starting a new playback stops and releases the prior
// one first.

use base64::Engine;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::VoiceError;

/// Decoded reply audio ready for a player.
#[derive(Debug, Clone)]
pub enum ReplyAudio {
    /// Self-describing container (WAV header present).
    Wav(Vec<u8>),
    /// Headerless PCM16 mono at the given rate.
    RawPcm { data: Vec<u8>, sample_rate: u32 },
}

/// Decode a base64 reply payload into playable audio.
///
/// WAV is detected by its RIFF magic; anything else needs the `sample_rate`
/// the server sent alongside, otherwise the payload is unplayable.
pub fn decode_reply(audio_b64: &str, sample_rate: Option<u32>) -> Result<ReplyAudio, VoiceError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(audio_b64)
        .map_err(|e| VoiceError::PlaybackFailure(format!("invalid base64 audio: {e}")))?;

    if bytes.is_empty() {
        return Err(VoiceError::PlaybackFailure("empty audio payload".to_string()));
    }

    if bytes.len() >= 4 && &bytes[..4] == b"RIFF" {
        return Ok(ReplyAudio::Wav(bytes));
    }

    match sample_rate {
        Some(rate) if rate > 0 => Ok(ReplyAudio::RawPcm {
            data: bytes,
            sample_rate: rate,
        }),
        _ => Err(VoiceError::PlaybackFailure(
            "raw audio payload without a sample rate".to_string(),
        )),
    }
}

/// Playback device trait.
///
/// The production implementation drives rodio; tests substitute a fake that
/// records what was played. `play` resolves once audio is flowing and hands
/// back a receiver that fires on natural completion (dropped on manual stop).
#[async_trait::async_trait]
pub trait Player: Send + Sync {
    async fn play(&mut self, audio: ReplyAudio) -> Result<oneshot::Receiver<()>, VoiceError>;

    /// Stop and release the live sink, if any.
    async fn stop(&mut self);

    fn is_playing(&self) -> bool;

    fn name(&self) -> &str;
}

struct PlaybackWorker {
    cancel: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl PlaybackWorker {
    fn stop(mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn is_live(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

pub struct RodioPlayer {
    worker: Option<PlaybackWorker>,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self { worker: None }
    }

    /// Whether the host exposes a default output device.
    pub fn device_available() -> bool {
        OutputStream::try_default().is_ok()
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RodioPlayer {
    fn drop(&mut self) {
        // Releases the sink even if the session is torn down mid-playback.
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl Player for RodioPlayer {
    async fn play(&mut self, audio: ReplyAudio) -> Result<oneshot::Receiver<()>, VoiceError> {
        // No overlapping audio: release the prior sink before starting.
        self.stop().await;

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_worker = Arc::clone(&cancel);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), VoiceError>>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = ready_tx.send(Err(VoiceError::PlaybackFailure(e.to_string())));
                    return;
                }
            };

            let sink = match Sink::try_new(&handle) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(VoiceError::PlaybackFailure(e.to_string())));
                    return;
                }
            };

            match audio {
                ReplyAudio::Wav(bytes) => match Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => sink.append(source),
                    Err(e) => {
                        let _ = ready_tx.send(Err(VoiceError::PlaybackFailure(format!(
                            "undecodable audio: {e}"
                        ))));
                        return;
                    }
                },
                ReplyAudio::RawPcm { data, sample_rate } => {
                    let samples: Vec<i16> = data
                        .chunks_exact(2)
                        .map(|b| i16::from_le_bytes([b[0], b[1]]))
                        .collect();
                    let source = rodio::buffer::SamplesBuffer::new(1, sample_rate, samples);
                    debug!(
                        "Playing raw PCM reply: {:.1}s at {}Hz",
                        source
                            .total_duration()
                            .map(|d| d.as_secs_f32())
                            .unwrap_or(0.0),
                        sample_rate
                    );
                    sink.append(source);
                }
            }

            let _ = ready_tx.send(Ok(()));

            // Hold the sink until the audio drains or the session stops it.
            while !sink.empty() && !cancel_worker.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(25));
            }

            let finished = sink.empty();
            sink.stop();
            if finished {
                let _ = done_tx.send(());
            }
            // Dropping done_tx without sending signals a manual stop.
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.worker = Some(PlaybackWorker {
                    cancel,
                    thread: Some(thread),
                });
                Ok(done_rx)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                warn!("Playback worker exited before reporting readiness");
                Err(VoiceError::PlaybackFailure(
                    "playback worker exited during startup".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.stop())
                .await
                .ok();
        }
    }

    fn is_playing(&self) -> bool {
        self.worker.as_ref().map(|w| w.is_live()).unwrap_or(false)
    }

    fn name(&self) -> &str {
        "rodio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..160 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decode_detects_wav_container() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(wav_bytes());
        match decode_reply(&b64, None).unwrap() {
            ReplyAudio::Wav(bytes) => assert_eq!(&bytes[..4], b"RIFF"),
            other => panic!("expected WAV, got {other:?}"),
        }
    }

    #[test]
    fn decode_raw_pcm_requires_rate() {
        let b64 = base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2, 3]);
        assert!(matches!(
            decode_reply(&b64, None),
            Err(VoiceError::PlaybackFailure(_))
        ));
        assert!(matches!(
            decode_reply(&b64, Some(16000)).unwrap(),
            ReplyAudio::RawPcm { sample_rate: 16000, .. }
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_reply("not base64!!!", Some(16000)).is_err());
        let empty = base64::engine::general_purpose::STANDARD.encode([]);
        assert!(decode_reply(&empty, Some(16000)).is_err());
    }
}
