//! kvfs backend layer: the flat key-value contract.
//!
//! This is the narrow waist of the kvfs stack. Everything at this level is a
//! flat key mapped to an attribute map - no path semantics, no directory
//! markers, no lock policy. Those belong to `kvfs-core`.
//!
//! A backend offers five primitives:
//! - strongly-consistent point `get`
//! - unconditional `put`
//! - `put_if_absent`, which fails with the *current* item when the key exists
//! - `delete`, which reports the previous item
//! - `scan_prefix`
//!
//! # Example
//!
//! ```rust,ignore
//! use kvfs_backend::{AttributeValue, InMemoryBackend, Item, KvBackend};
//!
//! let backend = InMemoryBackend::new();
//!
//! let mut item = Item::new();
//! item.insert("Key".to_string(), AttributeValue::S("certs/example".to_string()));
//! backend.put("certs/example", item).await.unwrap();
//!
//! assert!(backend.get("certs/example").await.unwrap().is_some());
//! ```

pub use bytes::Bytes;

mod attribute;
mod error;
pub mod in_memory;
pub mod local_disk;
mod traits;

pub use attribute::{AttributeValue, Item};
pub use error::{KvError, Result};
pub use in_memory::InMemoryBackend;
pub use local_disk::LocalDiskBackend;
pub use traits::KvBackend;
