//! Durable cursor storage

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::PersistenceError;

/// Persisted progress record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(default)]
    pub last_event_id: u64,
}

/// Trait for cursor persistence backends
pub trait CursorStore {
    /// Last persisted cursor, 0 when nothing was ever saved
    fn load(&self) -> Result<u64, PersistenceError>;

    /// Durably replace the persisted cursor
    fn save(&self, cursor: u64) -> Result<(), PersistenceError>;
}

/// JSON file `{"last_event_id": n}`
///
/// Saves write a sibling temp file, sync it, then rename it over the target,
/// so a crash mid-write leaves the previous cursor intact.
#[derive(Debug, Clone)]
pub struct JsonCursorStore {
    path: PathBuf,
}

impl JsonCursorStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CursorStore for JsonCursorStore {
    fn load(&self) -> Result<u64, PersistenceError> {
        if !self.path.exists() {
            return Ok(0);
        }

        let data = std::fs::read(&self.path)?;
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(0);
        }

        let state: CursorState = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;
        Ok(state.last_event_id)
    }

    fn save(&self, cursor: u64) -> Result<(), PersistenceError> {
        let data = serde_json::to_vec_pretty(&CursorState {
            last_event_id: cursor,
        })
        .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;

        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// In-memory store; can be switched to fail writes
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<u64>,
    saves: Mutex<usize>,
    fail_writes: Mutex<bool>,
}

impl MemoryCursorStore {
    pub fn new(cursor: u64) -> Self {
        Self {
            cursor: Mutex::new(cursor),
            ..Default::default()
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Successful saves so far
    pub fn saves(&self) -> usize {
        *self.saves.lock()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Result<u64, PersistenceError> {
        Ok(*self.cursor.lock())
    }

    fn save(&self, cursor: u64) -> Result<(), PersistenceError> {
        if *self.fail_writes.lock() {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "write refused",
            )));
        }
        *self.cursor.lock() = cursor;
        *self.saves.lock() += 1;
        Ok(())
    }
}
