//! Named locks built on the backend's conditional put.
//!
//! A lock is a single item at `lock_prefix + name` holding the time it was
//! taken. Acquiring is a `put_if_absent`; releasing is a plain delete. A
//! holder that never releases is evicted once its record is older than
//! `stale_after`.
//!
//! There is no fencing token. A holder that outlives `stale_after` can be
//! evicted while still working, and its later `unlock` deletes whatever
//! record is current, possibly one belonging to the new holder.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kvfs_backend::{AttributeValue, Item, KvBackend, KvError};
use tokio_util::sync::CancellationToken;

use crate::cancel::{cancellable, sleep};
use crate::record::{format_timestamp, parse_timestamp, KEY};
use crate::{Error, Result, StorageConfig};

pub(crate) const LOCKED: &str = "Locked";

/// Acquires and releases named locks.
///
/// Holds no state besides the backend handle and configuration; clones are
/// cheap and share the backend.
pub struct Locker<B: ?Sized> {
    backend: Arc<B>,
    config: StorageConfig,
}

impl<B: ?Sized> Clone for Locker<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: KvBackend + ?Sized> Locker<B> {
    pub fn new(backend: Arc<B>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The backend key holding the lock `name`.
    ///
    /// Names must be non-empty and free of `/`, so a lock never looks like
    /// a directory entry beneath another key.
    pub fn lock_key(&self, name: &str) -> Result<String> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidKey {
                key: name.to_string(),
                message: "lock names must be non-empty and contain no '/'".to_string(),
            });
        }
        Ok(format!("{}{}", self.config.lock_prefix, name))
    }

    /// Acquire `name`, waiting while another holder has it.
    ///
    /// Returns as soon as this caller's conditional put succeeds. A held
    /// lock older than `stale_after` is deleted and acquisition retried at
    /// once; a younger one is polled every `poll_interval`. A lock record
    /// whose timestamp cannot be read fails with
    /// [`Error::LockCorrupted`] rather than being taken over.
    pub async fn lock(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        let key = self.lock_key(name)?;

        loop {
            let attempt = self
                .backend
                .put_if_absent(&key, lock_item(&key, Utc::now()));

            let current = match cancellable(cancel, attempt).await {
                Ok(()) => {
                    tracing::info!(lock = name, "Acquired lock");
                    return Ok(());
                }
                Err(Error::Backend(KvError::ConditionFailed { current })) => current,
                Err(e) => return Err(e),
            };

            let locked_at = locked_at(name, &current)?;
            let stale = (Utc::now() - locked_at)
                .to_std()
                .is_ok_and(|age| age > self.config.stale_after);

            if stale {
                tracing::warn!(
                    lock = name,
                    locked_at = %format_timestamp(locked_at),
                    "Removing stale lock"
                );
                cancellable(cancel, self.backend.delete(&key)).await?;
                continue;
            }

            tracing::debug!(lock = name, "Lock is held, waiting");
            sleep(cancel, self.config.poll_interval).await?;
        }
    }

    /// Release `name` unconditionally.
    ///
    /// Releasing a lock that is not held is not an error.
    pub async fn unlock(&self, cancel: &CancellationToken, name: &str) -> Result<()> {
        let key = self.lock_key(name)?;
        cancellable(cancel, self.backend.delete(&key)).await?;
        tracing::info!(lock = name, "Released lock");
        Ok(())
    }

    /// Run `f` while holding `name`.
    ///
    /// The lock is released on every exit path of `f`. If `f` fails its
    /// error is returned and a failed release is only logged; if `f`
    /// succeeds a failed release is returned.
    pub async fn with_lock<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        name: &str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.lock(cancel, name).await?;
        let result = f().await;

        // Release must run even when the caller's token already fired.
        let released = self.unlock(&CancellationToken::new(), name).await;

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release)) => {
                tracing::warn!(lock = name, error = %release, "Failed to release lock");
                Err(e)
            }
        }
    }
}

fn lock_item(key: &str, now: DateTime<Utc>) -> Item {
    let mut item = Item::new();
    item.insert(KEY.to_string(), AttributeValue::S(key.to_string()));
    item.insert(LOCKED.to_string(), AttributeValue::S(format_timestamp(now)));
    item
}

fn locked_at(name: &str, current: &Item) -> Result<DateTime<Utc>> {
    let Some(raw) = current.get(LOCKED).and_then(AttributeValue::as_s) else {
        return Err(Error::LockCorrupted {
            name: name.to_string(),
            message: format!("invalid {} attribute", LOCKED),
        });
    };

    parse_timestamp(raw).map_err(|e| Error::LockCorrupted {
        name: name.to_string(),
        message: format!("unparsable {} attribute {:?}: {}", LOCKED, raw, e),
    })
}
