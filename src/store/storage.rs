//! Persistence sinks for the store's whitelisted state

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use super::state::PersistedState;
use crate::config::Config;

/// Destination for the persisted subset of the state
pub trait StateSink: Send {
    /// Read the last flushed state, if any was ever written
    fn load(&self) -> Result<Option<PersistedState>>;

    /// Write the state. Called after every mutation.
    fn flush(&self, state: &PersistedState) -> Result<()>;
}

/// Pretty-printed JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `state.json` inside the given directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("state.json"))
    }

    /// `state.json` in the platform data directory
    pub fn default_location() -> Result<Self> {
        Ok(Self::in_dir(&Config::data_dir()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateSink for JsonFileSink {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state from {:?}", self.path))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {:?}", self.path))?;
        Ok(Some(state))
    }

    fn flush(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(state).with_context(|| "Failed to serialize state")?;

        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write state to {:?}", self.path))?;

        Ok(())
    }
}

/// In-memory sink. Clones share the same slot, so a test can keep one
/// handle and give the other to the store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    slot: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    state: Option<PersistedState>,
    flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last flushed state
    pub fn saved(&self) -> Option<PersistedState> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).state.clone()
    }

    /// Number of flushes so far
    pub fn flush_count(&self) -> usize {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).flushes
    }
}

impl StateSink for MemorySink {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.saved())
    }

    fn flush(&self, state: &PersistedState) -> Result<()> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.state = Some(state.clone());
        slot.flushes += 1;
        Ok(())
    }
}
