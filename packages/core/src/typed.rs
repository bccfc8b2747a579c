//! Typed JSON access on top of any [`Storage`].

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result, Storage};

/// Extension trait for storing and loading serde types as JSON.
///
/// This trait is automatically implemented for all `Storage` implementations.
///
/// # Example
///
/// ```rust,ignore
/// use kvfs_core::TypedStorage;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct CertMeta {
///     sans: Vec<String>,
///     issuer: String,
/// }
///
/// storage.store_json(&cancel, "certs/example.com/meta.json", &meta).await?;
/// let meta: CertMeta = storage.load_json(&cancel, "certs/example.com/meta.json").await?;
/// ```
#[async_trait]
pub trait TypedStorage: Storage {
    /// Load `key` and deserialize it from JSON.
    ///
    /// A payload that is not valid JSON for `T` fails with
    /// [`Error::Decode`].
    async fn load_json<T: DeserializeOwned + Send>(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> Result<T> {
        let bytes = self.load(cancel, key).await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::decode(key, e.to_string()))
    }

    /// Serialize `value` as JSON and store it at `key`.
    async fn store_json<T: Serialize + Sync>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| Error::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store(cancel, key, Bytes::from(bytes)).await
    }
}

// Blanket implementation for all storages
impl<S: Storage + ?Sized> TypedStorage for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KvStorage;
    use kvfs_backend::InMemoryBackend;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Meta {
        sans: Vec<String>,
        renewals: u32,
    }

    #[tokio::test]
    async fn json_round_trip() {
        let storage = KvStorage::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();
        let meta = Meta {
            sans: vec!["example.com".to_string(), "www.example.com".to_string()],
            renewals: 3,
        };

        storage
            .store_json(&cancel, "certs/example.com/meta.json", &meta)
            .await
            .unwrap();
        let loaded: Meta = storage
            .load_json(&cancel, "certs/example.com/meta.json")
            .await
            .unwrap();

        assert_eq!(loaded, meta);
    }

    #[tokio::test]
    async fn non_json_payload_is_decode_error() {
        let storage = KvStorage::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();

        storage
            .store(&cancel, "certs/raw.pem", Bytes::from_static(b"-----BEGIN"))
            .await
            .unwrap();
        let err = storage
            .load_json::<Meta>(&cancel, "certs/raw.pem")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let storage = KvStorage::new(InMemoryBackend::new());
        let cancel = CancellationToken::new();

        let err = storage
            .load_json::<Meta>(&cancel, "certs/missing.json")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
