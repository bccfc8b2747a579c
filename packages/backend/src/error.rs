//! Error types for the backend layer.
//!
//! Errors at this level are transport-focused, plus the one semantic failure
//! the contract requires: a failed `put_if_absent` precondition.

use crate::Item;

/// Errors at the backend layer.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// I/O failure talking to the underlying storage.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored item could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `put_if_absent` found an existing item at the key.
    ///
    /// Carries the item that was present when the write was rejected.
    #[error("conditional check failed: key already exists")]
    ConditionFailed { current: Item },

    /// A backend-internal lock was poisoned by a panicking writer.
    #[error("backend lock poisoned")]
    Poisoned,
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, KvError>;
