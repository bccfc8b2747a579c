//! Backend storing one JSON file per key in a local directory.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Item, KvBackend, KvError, Result};

const ITEM_SUFFIX: &str = ".json";

// Base64url never produces '.', so digest names cannot collide with
// encoded ones.
const DIGEST_SUFFIX: &str = ".sha256.json";

/// Longest file name most filesystems accept.
const MAX_FILE_NAME: usize = 255;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A backend that keeps every item as a JSON file in a flat directory.
///
/// File names are the URL-safe base64 encoding of the key, so keys may
/// contain slashes or any other character. Keys whose encoding would not fit
/// in a file name are stored under the SHA-256 digest of the key instead.
/// Each file records its key next to the item, so scans never depend on
/// decoding the name. Writes go through a temp file in
/// the same directory and are then moved into place, so readers never see a
/// half-written item.
///
/// `put_if_absent` publishes its temp file with a hard link, which the
/// filesystem refuses when the target exists. Processes on one host sharing
/// a root directory therefore get a real conditional write.
pub struct LocalDiskBackend {
    root: PathBuf,
}

/// On-disk form of one item.
#[derive(Serialize, Deserialize)]
struct StoredItem<'a> {
    key: Cow<'a, str>,
    item: Cow<'a, Item>,
}

/// What a directory entry name says about the key it holds.
#[derive(Debug, PartialEq, Eq)]
enum FileName {
    /// Name encodes the key.
    Encoded(String),
    /// Name is a digest; the key is only known from the contents.
    Digest,
}

impl LocalDiskBackend {
    /// Open a backend rooted at an existing, writable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let attr = std::fs::metadata(&root)?;

        if !attr.is_dir() {
            return Err(KvError::Io(io::Error::other(format!(
                "root path {} must be a directory",
                root.display()
            ))));
        }

        if attr.permissions().readonly() {
            return Err(KvError::Io(io::Error::other(format!(
                "root directory {} must be writable",
                root.display()
            ))));
        }

        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// Create the root directory if needed, then open it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Self::new(root)
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, key: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key);
        if encoded.len() + ITEM_SUFFIX.len() <= MAX_FILE_NAME {
            return self.root.join(format!("{}{}", encoded, ITEM_SUFFIX));
        }

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.root
            .join(format!("{:x}{}", hasher.finalize(), DIGEST_SUFFIX))
    }

    fn temp_path(&self) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(".tmp-{}-{}", std::process::id(), n))
    }

    /// Classify a directory entry name.
    ///
    /// Returns `None` for temp files and anything this backend did not write.
    fn parse_file_name(name: &str) -> Option<FileName> {
        if name.strip_suffix(DIGEST_SUFFIX).is_some() {
            return Some(FileName::Digest);
        }
        let stem = name.strip_suffix(ITEM_SUFFIX)?;
        let raw = URL_SAFE_NO_PAD.decode(stem).ok()?;
        String::from_utf8(raw).ok().map(FileName::Encoded)
    }

    async fn write_temp(&self, key: &str, item: &Item) -> Result<PathBuf> {
        let stored = StoredItem {
            key: Cow::Borrowed(key),
            item: Cow::Borrowed(item),
        };
        let bytes = serde_json::to_vec(&stored)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        Ok(temp)
    }

    /// Read a stored file as `(key, item)`; `None` if it does not exist.
    async fn read_stored(path: &Path) -> Result<Option<(String, Item)>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let stored: StoredItem<'static> = serde_json::from_slice(&bytes)?;
                Ok(Some((stored.key.into_owned(), stored.item.into_owned())))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_item(path: &Path) -> Result<Option<Item>> {
        Ok(Self::read_stored(path).await?.map(|(_, item)| item))
    }
}

#[async_trait]
impl KvBackend for LocalDiskBackend {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        Self::read_item(&self.item_path(key)).await
    }

    async fn put(&self, key: &str, item: Item) -> Result<()> {
        let path = self.item_path(key);
        tracing::debug!("Writing {}...", path.display());

        let temp = self.write_temp(key, &item).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, item: Item) -> Result<()> {
        let path = self.item_path(key);
        let temp = self.write_temp(key, &item).await?;

        let result = loop {
            match tokio::fs::hard_link(&temp, &path).await {
                Ok(()) => break Ok(()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    match Self::read_item(&path).await {
                        Ok(Some(current)) => break Err(KvError::ConditionFailed { current }),
                        // Holder vanished between link and read; try again.
                        Ok(None) => {}
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => break Err(e.into()),
            }
        };

        let _ = tokio::fs::remove_file(&temp).await;
        result
    }

    async fn delete(&self, key: &str) -> Result<Option<Item>> {
        // Move the file aside first, so the item returned is exactly the one
        // removed even if a put races with this delete.
        let path = self.item_path(key);
        let taken = self.temp_path();
        match tokio::fs::rename(&path, &taken).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let previous = Self::read_item(&taken).await;
        let _ = tokio::fs::remove_file(&taken).await;
        previous
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut found = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match name.to_str().and_then(Self::parse_file_name) {
                Some(FileName::Encoded(key)) if key.starts_with(prefix) => {}
                Some(FileName::Digest) => {}
                _ => continue,
            }
            // Deleted between listing and reading: skip it.
            if let Some((key, item)) = Self::read_stored(&entry.path()).await? {
                if key.starts_with(prefix) {
                    found.push(item);
                }
            }
        }

        tracing::debug!(
            prefix,
            matched = found.len(),
            "Scanned {}",
            self.root.display()
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeValue;
    use bytes::Bytes;

    fn item(key: &str) -> Item {
        let mut item = Item::new();
        item.insert("Key".to_string(), AttributeValue::S(key.to_string()));
        item
    }

    #[test]
    fn file_names_round_trip_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        let path = backend.item_path("certificates/acme/example.com.crt");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(!name.contains('/'));
        assert_eq!(
            LocalDiskBackend::parse_file_name(name),
            Some(FileName::Encoded("certificates/acme/example.com.crt".to_string()))
        );
        assert_eq!(LocalDiskBackend::parse_file_name(".tmp-1-2"), None);
    }

    #[test]
    fn long_keys_use_digest_names() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        let key = format!("certificates/acme/{}.example.com/cert.crt", "a".repeat(240));
        let path = backend.item_path(&key);
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(name.len() <= MAX_FILE_NAME);
        assert_eq!(name.len(), 64 + DIGEST_SUFFIX.len());
        assert_eq!(LocalDiskBackend::parse_file_name(name), Some(FileName::Digest));
        assert_eq!(backend.item_path(&key), path);
        assert_ne!(backend.item_path(&format!("{}x", key)), path);
    }

    #[test]
    fn rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalDiskBackend::new(dir.path().join("missing")).is_err());
        assert!(LocalDiskBackend::create(dir.path().join("missing")).is_ok());
    }

    #[test]
    fn rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(LocalDiskBackend::new(file).is_err());
    }

    #[tokio::test]
    async fn basic_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        let mut stored = item("a/b");
        stored.insert(
            "Contents".to_string(),
            AttributeValue::B(Bytes::from_static(b"\x00\xffpem")),
        );
        backend.put("a/b", stored.clone()).await.unwrap();

        assert_eq!(backend.get("a/b").await.unwrap(), Some(stored.clone()));
        assert_eq!(backend.delete("a/b").await.unwrap(), Some(stored));
        assert_eq!(backend.get("a/b").await.unwrap(), None);
        assert_eq!(backend.delete("a/b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        backend.put("k", item("first")).await.unwrap();
        backend.put("k", item("second")).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(item("second")));
    }

    #[tokio::test]
    async fn put_if_absent_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        backend.put_if_absent("LOCK-x", item("first")).await.unwrap();
        let err = backend
            .put_if_absent("LOCK-x", item("second"))
            .await
            .unwrap_err();
        match err {
            KvError::ConditionFailed { current } => assert_eq!(current, item("first")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn scan_skips_temp_files_and_other_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        for key in ["a", "a/b", "a/c", "ab/c"] {
            backend.put(key, item(key)).await.unwrap();
        }
        std::fs::write(dir.path().join(".tmp-0-0"), b"garbage").unwrap();

        let mut found: Vec<_> = backend
            .scan_prefix("a/")
            .await
            .unwrap()
            .into_iter()
            .map(|i| match &i["Key"] {
                AttributeValue::S(key) => key.clone(),
                other => panic!("unexpected key attribute: {other:?}"),
            })
            .collect();
        found.sort();
        assert_eq!(found, vec!["a/b".to_string(), "a/c".to_string()]);
    }

    #[tokio::test]
    async fn delete_leaves_no_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        backend.put("a", item("a")).await.unwrap();
        assert_eq!(backend.delete("a").await.unwrap(), Some(item("a")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn delete_returns_the_item_it_removed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = std::sync::Arc::new(LocalDiskBackend::new(dir.path()).unwrap());

        // Every delete must hand back one of the written versions, and a
        // version may be reported removed at most once.
        let writer = {
            let backend = backend.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    backend.put("k", item(&format!("v{i}"))).await.unwrap();
                }
            })
        };
        let mut removed = Vec::new();
        for _ in 0..50 {
            if let Some(previous) = backend.delete("k").await.unwrap() {
                removed.push(previous);
            }
        }
        writer.await.unwrap();
        if let Some(previous) = backend.delete("k").await.unwrap() {
            removed.push(previous);
        }

        let mut seen = std::collections::BTreeSet::new();
        for previous in &removed {
            let AttributeValue::S(version) = &previous["Key"] else {
                panic!("unexpected item: {previous:?}");
            };
            assert!(seen.insert(version.clone()), "{version} removed twice");
        }
        assert!(backend.get("k").await.unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalDiskBackend::new(dir.path()).unwrap();

        std::fs::write(backend.item_path("bad"), b"{not json").unwrap();
        let err = backend.get("bad").await.unwrap_err();
        assert!(matches!(err, KvError::Serialization(_)));
    }
}
