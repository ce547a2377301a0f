//! Native-speech fallback path.
//!
//! When the streaming transport is unavailable the session falls back to
//! host speech tooling driven as subprocesses: a recognizer that prints
//! recognized utterances to stdout one per line until killed, and a
//! synthesizer that speaks the text passed as its final argument (`say` on
//! macOS, `espeak-ng` or a vendor CLI elsewhere). Both commands come from
//! configuration and are probed for existence before the capability is
//! advertised.

use anyhow::{Context, Result};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::VoiceError;

/// Recognized transcripts at or below this length are discarded as noise.
pub const MIN_TRANSCRIPT_CHARS: usize = 3;

/// Whether a recognized transcript is long enough to be a real utterance.
pub fn is_meaningful(transcript: &str) -> bool {
    transcript.trim().chars().count() > MIN_TRANSCRIPT_CHARS
}

/// Native speech recognition seam.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    /// Begin listening; recognized lines stream out of the receiver.
    async fn start(&mut self) -> Result<mpsc::Receiver<String>, VoiceError>;

    /// Stop listening and return the last recognized transcript, if any.
    async fn stop(&mut self) -> Result<Option<String>>;

    fn is_listening(&self) -> bool;
}

/// Native speech synthesis seam (the "read aloud" affordance).
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Start speaking the text. Returns once the utterance is underway;
    /// speaking again first cancels the prior utterance.
    async fn speak(&mut self, text: &str) -> Result<(), VoiceError>;

    /// Cancel any in-progress speech.
    async fn stop(&mut self) -> Result<()>;

    fn is_speaking(&self) -> bool;
}

/// Split a configured command line into program + arguments.
fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Whether the configured command's binary resolves on this host.
pub fn command_available(command: &str) -> bool {
    match split_command(command) {
        Some((program, _)) => which::which(&program).is_ok(),
        None => false,
    }
}

// ── Subprocess recognizer ──────────────────────────────────────────

pub struct CommandRecognizer {
    command: String,
    child: Option<Child>,
    last_transcript: Arc<Mutex<Option<String>>>,
}

impl CommandRecognizer {
    pub fn new(command: String) -> Self {
        Self {
            command,
            child: None,
            last_transcript: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait::async_trait]
impl Recognizer for CommandRecognizer {
    async fn start(&mut self) -> Result<mpsc::Receiver<String>, VoiceError> {
        if self.child.is_some() {
            return Err(VoiceError::InvalidState("recognizer already listening"));
        }

        let (program, args) = split_command(&self.command)
            .ok_or_else(|| VoiceError::NoInputMethod)?;

        let mut child = Command::new(&program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VoiceError::PermissionDenied(format!("failed to start recognizer '{program}': {e}"))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            VoiceError::PermissionDenied("recognizer produced no stdout".to_string())
        })?;

        info!("Native recognition started ({})", program);

        let (line_tx, line_rx) = mpsc::channel(16);
        let last_transcript = Arc::clone(&self.last_transcript);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                debug!("Recognized: {}", line);
                *last_transcript.lock().await = Some(line.clone());
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
            debug!("Recognizer output stream ended");
        });

        self.child = Some(child);
        Ok(line_rx)
    }

    async fn stop(&mut self) -> Result<Option<String>> {
        if let Some(mut child) = self.child.take() {
            child.kill().await.context("Failed to stop recognizer")?;
        }
        Ok(self.last_transcript.lock().await.take())
    }

    fn is_listening(&self) -> bool {
        self.child.is_some()
    }
}

// ── Subprocess synthesizer ─────────────────────────────────────────

pub struct CommandSynthesizer {
    command: String,
    child: Option<Child>,
}

impl CommandSynthesizer {
    pub fn new(command: String) -> Self {
        Self {
            command,
            child: None,
        }
    }

    fn reap_finished(&mut self) {
        if let Some(child) = &mut self.child {
            if matches!(child.try_wait(), Ok(Some(_))) {
                self.child = None;
            }
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
        // One utterance at a time.
        self.stop().await.map_err(|e| {
            VoiceError::PlaybackFailure(format!("failed to cancel prior speech: {e}"))
        })?;

        let (program, args) =
            split_command(&self.command).ok_or_else(|| VoiceError::NoInputMethod)?;

        let child = Command::new(&program)
            .args(&args)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VoiceError::PlaybackFailure(format!(
                    "failed to start synthesizer '{program}': {e}"
                ))
            })?;

        info!("Speaking reply via {} ({} chars)", program, text.chars().count());
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait().context("synthesizer wait failed")?.is_none() {
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop synthesizer: {}", e);
                }
            }
        }
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.reap_finished();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_transcripts_are_noise() {
        assert!(!is_meaningful(""));
        assert!(!is_meaningful("ok"));
        assert!(!is_meaningful(" no "));
        assert!(is_meaningful("stop"));
        assert!(is_meaningful("what is artificial intelligence"));
    }

    #[test]
    fn command_splitting() {
        let (program, args) = split_command("espeak-ng -v en-us").unwrap();
        assert_eq!(program, "espeak-ng");
        assert_eq!(args, vec!["-v", "en-us"]);
        assert!(split_command("   ").is_none());
    }

    #[test]
    fn missing_binary_is_unavailable() {
        assert!(!command_available("definitely-not-a-real-binary-6f2a"));
        assert!(!command_available(""));
    }
}
