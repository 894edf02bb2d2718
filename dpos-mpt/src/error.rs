//! Error types for trie operations.

use dpos_storage::StorageError;
use thiserror::Error;

use crate::node::Hash256;

/// Result type for trie operations.
pub type MptResult<T> = std::result::Result<T, MptError>;

/// Errors that can occur during trie operations.
#[derive(Error, Debug)]
pub enum MptError {
    /// A persisted node referenced by hash is absent from the store.
    #[error("trie node not found: {hash}")]
    MissingNode {
        /// Hex-encoded hash of the missing node.
        hash: String,
    },

    /// A persisted node failed to deserialize, or the trie shape does not
    /// match the key being traversed.
    #[error("corrupt trie: {message}")]
    Corrupt {
        /// What was malformed.
        message: String,
    },

    /// Failure in the underlying key-value store.
    #[error("trie storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl MptError {
    /// Create a missing-node error.
    pub fn missing_node(hash: &Hash256) -> Self {
        Self::MissingNode {
            hash: hex::encode(hash),
        }
    }

    /// Create a corruption error.
    pub fn corrupt<M: Into<String>>(message: M) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_node_display() {
        let err = MptError::missing_node(&[0xab; 32]);
        assert!(err.to_string().contains("abab"));
    }

    #[test]
    fn test_storage_error_wrapping() {
        let err: MptError = StorageError::backend("disk gone").into();
        assert!(err.to_string().contains("disk gone"));
    }
}
