//! Storage error types
//!
//! Errors raised by the sorted key-value stores themselves. Decoding problems
//! belong to the model layer, not here.

use thiserror::Error;

/// Errors that can occur in a store backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend (SQLite) rejected an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
