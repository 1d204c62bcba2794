use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::history::record::HistoryRecord;

/// Key of the storage slot that holds the history list
pub const HISTORY_STORAGE_KEY: &str = "imageCaptioningHistory";

/// Failures reading or writing the history slot
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("history storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistence for the history list.
///
/// `load` returns an empty list for a missing or unparsable slot; only
/// genuine read failures are errors.
pub trait HistoryBackend: Send + Sync {
    fn load(&self) -> Result<Vec<HistoryRecord>, StorageError>;

    fn save(&self, records: &[HistoryRecord]) -> Result<(), StorageError>;
}

/// Parses stored slot content, treating garbage as no history
pub fn parse_slot(raw: &str) -> Vec<HistoryRecord> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(e) => {
            warn!("Ignoring unreadable history slot: {}", e);
            Vec::new()
        }
    }
}

/// Keeps the slot in memory; for tests and ephemeral clients
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slot: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `raw` already in the slot
    pub fn with_raw(raw: &str) -> Self {
        Self {
            slot: Mutex::new(Some(raw.to_string())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl HistoryBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.as_deref().map(parse_slot).unwrap_or_default())
    }

    fn save(&self, records: &[HistoryRecord]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(records)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw);
        Ok(())
    }
}

/// Keeps the slot as `<dir>/imageCaptioningHistory.json`
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(format!("{}.json", HISTORY_STORAGE_KEY));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryBackend for FileBackend {
    fn load(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let records = parse_slot(&raw);
                trace!("Loaded {} history records from {}", records.len(), self.path.display());
                Ok(records)
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", self.path.display());
                Ok(Vec::new())
            },
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, records: &[HistoryRecord]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(records)?;

        // Replace the slot atomically
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        trace!("Saved {} history records to {}", records.len(), self.path.display());
        Ok(())
    }
}
