// Persisted session identity.
//
// The backend correlates a client with its server-side conversational state
// through an opaque session identifier. The identifier outlives the
// in-memory session: it is read from a state file on creation and reused
// across restarts, so a remounted session resumes the same backend context.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const STATE_FILE: &str = "session-id";

/// Default state file location under the per-user data directory.
pub fn default_state_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "virgil-voice")
        .map(|dirs| dirs.data_dir().join(STATE_FILE))
}

/// Load the persisted session identifier, generating and persisting a new
/// one when absent or unreadable.
pub fn load_or_generate(path: &Path) -> Result<String> {
    if let Ok(existing) = fs::read_to_string(path) {
        let existing = existing.trim().to_string();
        if !existing.is_empty() {
            debug!("Reusing persisted session id {}", existing);
            return Ok(existing);
        }
    }

    let id = Uuid::new_v4().to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory {:?}", parent))?;
    }
    fs::write(path, &id).with_context(|| format!("Failed to persist session id to {:?}", path))?;

    info!("Generated new session id {}", id);
    Ok(id)
}
