//! Persistence of watcher progress

pub mod cursor;

pub use cursor::{CursorState, CursorStore, JsonCursorStore, MemoryCursorStore};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}
