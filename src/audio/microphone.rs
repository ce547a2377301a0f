// Microphone capture via cpal.
//
// cpal streams are not Send, so the stream lives on a dedicated worker
// thread for the duration of one recording episode. Captured samples are
// converted to 16-bit PCM, downmixed to the target channel count, decimated
// toward the target sample rate, and batched into fixed-duration frames on
// a tokio channel.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};
use crate::error::VoiceError;

/// Downmixes, decimates and batches raw device samples into [`AudioFrame`]s.
pub(crate) struct FrameBatcher {
    source_channels: u16,
    out_channels: u16,
    out_rate: u32,
    ratio: u64,
    samples_per_frame: usize,
    pending: Vec<i16>,
    sample_index: u64,
    emitted_samples: u64,
}

impl FrameBatcher {
    pub(crate) fn new(source_rate: u32, source_channels: u16, target: &CaptureConfig) -> Self {
        // Integer decimation toward the target rate; if the rates do not
        // divide evenly the frames keep the nearest achievable rate and the
        // payload header records it.
        let ratio = (source_rate / target.sample_rate).max(1);
        let out_rate = source_rate / ratio;
        let samples_per_frame = (out_rate as u64 * target.frame_duration_ms / 1000) as usize
            * target.channels as usize;
        Self {
            source_channels,
            out_channels: target.channels,
            out_rate,
            ratio: ratio as u64,
            samples_per_frame: samples_per_frame.max(1),
            pending: Vec::with_capacity(samples_per_frame.max(1)),
            sample_index: 0,
            emitted_samples: 0,
        }
    }

    pub(crate) fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Feed one interleaved f32 buffer; returns every completed frame.
    pub(crate) fn push(&mut self, data: &[f32]) -> Vec<AudioFrame> {
        let mut frames = Vec::new();
        for chunk in data.chunks(self.source_channels as usize) {
            // Downmix to mono by averaging, then decimate.
            let mixed: f32 = chunk.iter().sum::<f32>() / chunk.len() as f32;
            if self.sample_index % self.ratio == 0 {
                let s = (mixed.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                for _ in 0..self.out_channels {
                    self.pending.push(s);
                }
            }
            self.sample_index += 1;
        }

        while self.pending.len() >= self.samples_per_frame {
            let rest = self.pending.split_off(self.samples_per_frame);
            let samples = std::mem::replace(&mut self.pending, rest);
            let timestamp_ms = self.emitted_samples * 1000
                / (self.out_rate as u64 * self.out_channels as u64);
            self.emitted_samples += samples.len() as u64;
            frames.push(AudioFrame {
                samples,
                sample_rate: self.out_rate,
                channels: self.out_channels,
                timestamp_ms,
            });
        }
        frames
    }
}

pub struct MicrophoneBackend {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Whether the host exposes a default input device at all.
    pub fn device_available() -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn spawn_worker(
        config: CaptureConfig,
        running: Arc<AtomicBool>,
        frame_tx: mpsc::Sender<AudioFrame>,
        ready_tx: oneshot::Sender<Result<(), VoiceError>>,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(VoiceError::PermissionDenied(
                        "no input device available".to_string(),
                    )));
                    return;
                }
            };

            let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

            let supported = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(VoiceError::PermissionDenied(e.to_string())));
                    return;
                }
            };

            let source_rate = supported.sample_rate().0;
            let source_channels = supported.channels();
            info!(
                "Opening microphone '{}': {}Hz, {} channels (target {}Hz mono)",
                device_name, source_rate, source_channels, config.sample_rate
            );

            let mut batcher = FrameBatcher::new(source_rate, source_channels, &config);
            let running_cb = Arc::clone(&running);
            let mut emit = move |data: &[f32]| {
                if !running_cb.load(Ordering::SeqCst) {
                    return;
                }
                for frame in batcher.push(data) {
                    if frame_tx.try_send(frame).is_err() {
                        // Receiver gone or backed up; drop rather than block
                        // the audio callback.
                        debug!("Dropping captured frame: channel unavailable");
                    }
                }
            };

            let err_fn = |e: cpal::StreamError| warn!("Microphone stream error: {}", e);
            let stream_config = supported.config();
            let stream = match supported.sample_format() {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| emit(data),
                    err_fn,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> =
                            data.iter().map(|s| *s as f32 / i16::MAX as f32).collect();
                        emit(&floats);
                    },
                    err_fn,
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(VoiceError::PermissionDenied(format!(
                        "unsupported sample format: {other:?}"
                    ))));
                    return;
                }
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(VoiceError::PermissionDenied(e.to_string())));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(VoiceError::PermissionDenied(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Hold the stream open until the session stops capture.
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(20));
            }

            drop(stream);
            debug!("Microphone worker stopped ('{}')", device_name);
        })
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, VoiceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(VoiceError::InvalidState("capture already running"));
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.running.store(true, Ordering::SeqCst);
        let worker = Self::spawn_worker(
            self.config.clone(),
            Arc::clone(&self.running),
            frame_tx,
            ready_tx,
        );

        match ready_rx.await {
            Ok(Ok(())) => {
                self.worker = Some(worker);
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                Err(VoiceError::PermissionDenied(
                    "microphone worker exited during startup".to_string(),
                ))
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .context("capture worker join task failed")?
                .map_err(|_| anyhow::anyhow!("capture worker panicked"))?;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        // Releases the device even if the session is torn down mid-episode.
        self.running.store(false, Ordering::SeqCst);
    }
}
