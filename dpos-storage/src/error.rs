//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Failed to open the underlying database.
    #[error("failed to open store at {path}: {message}")]
    Open {
        /// Filesystem path that was being opened.
        path: String,
        /// Error message from the backend.
        message: String,
    },

    /// Backend-specific read/write failure.
    #[error("storage backend error: {message}")]
    Backend {
        /// Error message from the backend.
        message: String,
    },
}

impl StorageError {
    /// Create an open error.
    pub fn open<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Open {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a backend error.
    pub fn backend<M: Into<String>>(message: M) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
