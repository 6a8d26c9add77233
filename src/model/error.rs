//! Model layer error types

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while encoding, decoding or persisting entities
#[derive(Error, Debug)]
pub enum ModelError {
    /// Point lookup found no record under the key
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored record could not be decoded
    #[error("Malformed record {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// Timestamp outside the range the key encoding can order
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// An in-memory value cannot be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The underlying store failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Writing text output failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub(crate) fn malformed(key: impl Into<String>, reason: impl ToString) -> Self {
        ModelError::Malformed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::NotFound("categories.CAT-7".to_string());
        assert_eq!(err.to_string(), "Not found: categories.CAT-7");

        let err = ModelError::malformed("categories.CAT-1", "expected value at line 1 column 1");
        assert_eq!(
            err.to_string(),
            "Malformed record categories.CAT-1: expected value at line 1 column 1"
        );
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: ModelError = StorageError::Lock("poisoned".to_string()).into();
        assert_eq!(err.to_string(), "Lock error: poisoned");
    }
}
