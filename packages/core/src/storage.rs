//! The caller-facing storage interface.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Key-value storage with basic filesystem semantics, plus named locks.
///
/// Keys use `/` to separate path components and have no leading or
/// trailing slash. A "file" is a key with a value. A "directory" is a key
/// with no value that prefixes other keys; directories only exist implicitly,
/// as ancestors of stored files.
///
/// `load`, `delete`, `list` and `stat` fail with
/// [`Error::NotFound`](crate::Error::NotFound) when the key does not exist.
///
/// Processes sharing certificates should all use storages pointing at the
/// same key space with the same configuration. Implementations are safe for
/// concurrent use, and every method honors `cancel`.
///
/// This is not a streaming API: values are loaded and stored whole.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Put `value` at `key`, creating or overwriting it.
    async fn store(&self, cancel: &CancellationToken, key: &str, value: Bytes) -> Result<()>;

    /// The value at `key`.
    async fn load(&self, cancel: &CancellationToken, key: &str) -> Result<Bytes>;

    /// Delete `key`. If it is a directory, everything beneath it is deleted.
    async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<()>;

    /// Whether `key` exists as a file or directory.
    ///
    /// Any failure to check reads as `false`.
    async fn exists(&self, cancel: &CancellationToken, key: &str) -> bool;

    /// Keys beneath `path`, in no particular order.
    ///
    /// With `recursive` every descendant is listed; otherwise only direct
    /// children.
    async fn list(
        &self,
        cancel: &CancellationToken,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<String>>;

    /// Information about `key`.
    async fn stat(&self, cancel: &CancellationToken, key: &str) -> Result<KeyInfo>;

    /// Acquire the lock `name`, blocking until it is free or stale.
    ///
    /// After acquiring a lock guarding idempotent work, check whether the
    /// work is still needed: another process may have finished it while
    /// this one waited.
    async fn lock(&self, cancel: &CancellationToken, name: &str) -> Result<()>;

    /// Release the lock `name`.
    ///
    /// Call only after a successful `lock`, once the critical section is
    /// over, whether it succeeded or not.
    async fn unlock(&self, cancel: &CancellationToken, name: &str) -> Result<()>;
}

/// What `stat` reports about a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub key: String,
    pub modified: Option<DateTime<Utc>>,
    pub is_terminal: bool,
    pub size: u64,
}

/// The outcome of an existence check that keeps failures visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// A record is stored at the key.
    Present,
    /// The backend answered, and nothing is stored at the key.
    Absent,
    /// The check failed or was cancelled; the key may or may not exist.
    Indeterminate,
}

impl Presence {
    /// The lossy boolean view: only `Present` is `true`.
    pub fn exists(self) -> bool {
        matches!(self, Presence::Present)
    }
}
