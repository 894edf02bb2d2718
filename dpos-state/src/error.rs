//! Error types for the state factory.

use dpos_mpt::MptError;
use dpos_storage::StorageError;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Errors that can occur during state operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// The sender's balance does not cover the transferred amount.
    #[error("not enough balance")]
    InsufficientBalance,

    /// No account exists for the address.
    #[error("account does not exist: {0}")]
    AccountNotFound(String),

    /// An account already exists where one was being created.
    #[error("account already exists: {0}")]
    AccountCollision(String),

    /// State serialization failed.
    #[error("failed to encode state: {0}")]
    Encoding(String),

    /// State deserialization failed.
    #[error("failed to decode state: {0}")]
    Decoding(String),

    /// The address does not identify a contract.
    #[error("contract does not exist: {0}")]
    ContractNotFound(String),

    /// Failure in the trie or key-value layer.
    #[error("storage failure while {context}: {message}")]
    Storage {
        /// What the factory was doing.
        context: String,
        /// Underlying cause.
        message: String,
    },

    /// Invalid factory configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No candidate archive exists at the height.
    #[error("no candidate archive at height {0}")]
    HeightNotFound(u64),

    /// A lifecycle operation was used before `start`.
    #[error("state factory is not started")]
    NotStarted,
}

impl StateError {
    /// Create a storage error with a human-readable context.
    pub fn storage<C: Into<String>, M: ToString>(context: C, cause: M) -> Self {
        Self::Storage {
            context: context.into(),
            message: cause.to_string(),
        }
    }
}

impl From<StorageError> for StateError {
    fn from(err: StorageError) -> Self {
        StateError::storage("accessing key-value store", err)
    }
}

impl From<MptError> for StateError {
    fn from(err: MptError) -> Self {
        StateError::storage("accessing state trie", err)
    }
}
