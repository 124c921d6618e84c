//! Storage error types
//!
//! Defines the errors a key-value storage backend can report. Callers in this
//! crate treat every variant as "storage unavailable" and degrade rather than fail.

use thiserror::Error;

/// Errors that can occur in a key-value storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage medium cannot be reached (disabled, private mode, quota, lock)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
