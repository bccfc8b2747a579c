//! kvfs core: filesystem semantics and named locks over a flat key-value store.
//!
//! This layer adds meaning to the flat items of `kvfs-backend`:
//! - `Key`: validated slash-separated path
//! - `Record`: a file or directory marker, and its attribute-map codec
//! - `KvStorage`: files, implicit directories, recursive list and delete
//! - `Locker`: named locks using the backend's conditional put
//!
//! Callers normally program against the [`Storage`] trait, which bundles
//! file operations with `lock`/`unlock` the way a TLS certificate manager
//! expects.
//!
//! # Example
//!
//! ```rust,ignore
//! use kvfs_backend::LocalDiskBackend;
//! use kvfs_core::{KvStorage, Storage, StorageConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let storage = KvStorage::with_config(
//!     LocalDiskBackend::create("/var/lib/kvfs")?,
//!     StorageConfig::default(),
//! );
//! let cancel = CancellationToken::new();
//!
//! storage.lock(&cancel, "issue_cert_example.com").await?;
//! if !storage.exists(&cancel, "certificates/example.com/example.com.crt").await {
//!     storage.store(&cancel, "certificates/example.com/example.com.crt", pem).await?;
//! }
//! storage.unlock(&cancel, "issue_cert_example.com").await?;
//! ```

pub use bytes::Bytes;
pub use tokio_util::sync::CancellationToken;

mod cancel;
mod config;
mod error;
mod key;
mod kv_storage;
mod lock;
mod record;
mod storage;
mod typed;

pub use config::StorageConfig;
pub use error::{Error, Result};
pub use key::Key;
pub use kv_storage::KvStorage;
pub use lock::Locker;
pub use record::Record;
pub use storage::{KeyInfo, Presence, Storage};
pub use typed::TypedStorage;

// Re-export backend types for convenience
pub use kvfs_backend::{InMemoryBackend, KvBackend, KvError, LocalDiskBackend};
