//! Configuration for storages and lockers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables shared by [`KvStorage`](crate::KvStorage) and
/// [`Locker`](crate::Locker).
///
/// Every process sharing a key space should use the same values, in
/// particular the same `lock_prefix`.
///
/// Deserializes from JSON with durations in whole seconds / milliseconds:
///
/// ```rust
/// use kvfs_core::StorageConfig;
///
/// let config = StorageConfig::from_json(r#"{"stale_after_secs": 30}"#).unwrap();
/// assert_eq!(config.stale_after.as_secs(), 30);
/// assert_eq!(config.lock_prefix, "LOCK-");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Prefix turning a lock name into its key.
    ///
    /// Path keys starting with this prefix are rejected by
    /// [`KvStorage`](crate::KvStorage), so an empty prefix leaves no valid
    /// paths at all.
    pub lock_prefix: String,

    /// Age after which an unreleased lock is presumed abandoned.
    #[serde(rename = "stale_after_secs", with = "secs")]
    pub stale_after: Duration,

    /// Wait between acquisition attempts on a held lock.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_prefix: "LOCK-".to_string(),
            stale_after: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl StorageConfig {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    #[must_use]
    pub fn with_lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
