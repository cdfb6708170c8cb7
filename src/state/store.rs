//! Durable JSON store for the agent state.
//!
//! Saves go through a temp file in the same directory followed by a rename,
//! so the previous document stays authoritative if a write fails midway.

use crate::types::AgentState;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed agent state.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, or the initial state if nothing has been saved yet.
    pub fn load(&self) -> Result<AgentState> {
        if !self.path.exists() {
            info!("No state at {:?}, starting fresh", self.path);
            return Ok(AgentState::default());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;
        let state: AgentState = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file {}", self.path.display()))?;
        debug!(
            mode = %state.mode(),
            proposals = state.pending_proposals.len(),
            "State loaded"
        );
        Ok(state)
    }

    /// Persist the state atomically.
    pub fn save(&self, state: &AgentState) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory {}", parent.display()))?;

        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".into());
        let tmp_path = parent.join(format!(".{}.tmp", file_name));

        {
            let mut tmp = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            tmp.write_all(json.as_bytes())
                .context("Failed to write state temp file")?;
            tmp.sync_all().context("Failed to sync state temp file")?;
        }

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e)
                .with_context(|| format!("Failed to replace state file {}", self.path.display()));
        }

        info!("State saved to {:?}", self.path);
        Ok(())
    }
}
