//! Error types for the core layer.

use kvfs_backend::KvError;

/// Errors from storage and lock operations.
///
/// Callers branch on [`Error::NotFound`]; everything else is either data
/// corruption, a backend failure, or cancellation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file or directory does not exist.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// The key is empty or has an empty path component.
    #[error("invalid key {key:?}: {message}")]
    InvalidKey { key: String, message: String },

    /// A stored item has the wrong shape, or its contents failed to parse.
    #[error("decode error for {key:?}: {message}")]
    Decode { key: String, message: String },

    /// A value could not be serialized before storing.
    #[error("encode error for {key:?}: {message}")]
    Encode { key: String, message: String },

    /// A lock record exists but its timestamp cannot be read.
    #[error("lock {name:?} is corrupted: {message}")]
    LockCorrupted { name: String, message: String },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Error from the backend, unchanged.
    #[error("backend error: {0}")]
    Backend(#[from] KvError),
}

impl Error {
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    pub(crate) fn decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this is the not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether retrying the same call might succeed.
    ///
    /// Only backend I/O failures qualify. Cancellation, corruption and
    /// not-found are never transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Backend(KvError::Io(_)))
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
