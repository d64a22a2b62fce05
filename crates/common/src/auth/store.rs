//! Token store contract
//!
//! A string key/value store holding exactly four keys. Backends live
//! elsewhere (platform keychain here, JSON file in the infrastructure crate);
//! this module only defines the contract and an in-memory implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::StoreError;

/// Persisted key names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    /// Access token expiry, stringified epoch milliseconds
    TokenExpiry,
    /// PKCE verifier of the attempt in flight
    CodeVerifier,
}

impl StorageKey {
    /// Every key the auth core writes
    pub const ALL: [Self; 4] =
        [Self::AccessToken, Self::RefreshToken, Self::TokenExpiry, Self::CodeVerifier];

    /// Name under which the value is persisted
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::TokenExpiry => "token_expiry",
            Self::CodeVerifier => "code_verifier",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent string key/value store for tokens
///
/// Implementations must make `clear_all` idempotent. Backends that can
/// apply several keys in one write should override `set_many` so that the
/// access token and its expiry land together.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError>;

    /// Write several keys, in order
    async fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(*key, value).await?;
        }
        Ok(())
    }

    /// Remove a value (no error when absent)
    async fn remove(&self, key: StorageKey) -> Result<(), StoreError>;

    /// Remove all four keys
    async fn clear_all(&self) -> Result<(), StoreError> {
        for key in StorageKey::ALL {
            self.remove(key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), StoreError> {
        (**self).set_many(entries).await
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        (**self).remove(key).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        (**self).clear_all().await
    }
}

/// Process-local token store
///
/// Nothing survives a restart. Used for tests and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(&key).cloned())
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        debug!(key = %key, "Storing value in memory token store");
        self.entries.lock().await.insert(key, value.to_string());
        Ok(())
    }

    async fn set_many(&self, entries: &[(StorageKey, String)]) -> Result<(), StoreError> {
        let mut map = self.entries.lock().await;
        for (key, value) in entries {
            map.insert(*key, value.clone());
        }
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        self.entries.lock().await.remove(&key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates persisted key names.
    #[test]
    fn test_key_names() {
        let names: Vec<_> = StorageKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, ["access_token", "refresh_token", "token_expiry", "code_verifier"]);
    }

    /// Validates basic get/set/remove on the memory store.
    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(StorageKey::AccessToken).await.unwrap(), None);

        store.set(StorageKey::AccessToken, "tok").await.unwrap();
        assert_eq!(store.get(StorageKey::AccessToken).await.unwrap().as_deref(), Some("tok"));

        store.remove(StorageKey::AccessToken).await.unwrap();
        store.remove(StorageKey::AccessToken).await.unwrap();
        assert_eq!(store.get(StorageKey::AccessToken).await.unwrap(), None);
    }

    /// Validates that `clear_all` removes every key and is idempotent.
    #[tokio::test]
    async fn test_clear_all_idempotent() {
        let store = MemoryTokenStore::new();
        store
            .set_many(&[
                (StorageKey::AccessToken, "a".to_string()),
                (StorageKey::TokenExpiry, "1".to_string()),
                (StorageKey::RefreshToken, "r".to_string()),
                (StorageKey::CodeVerifier, "v".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(store.len().await, 4);

        store.clear_all().await.unwrap();
        store.clear_all().await.unwrap();
        assert!(store.is_empty().await);
    }

    /// Validates that the `Arc` forwarding impl reaches the inner store.
    #[tokio::test]
    async fn test_arc_dyn_store() {
        let inner = Arc::new(MemoryTokenStore::new());
        let store: Arc<dyn TokenStore> = inner.clone();

        store.set(StorageKey::RefreshToken, "r1").await.unwrap();
        assert_eq!(inner.get(StorageKey::RefreshToken).await.unwrap().as_deref(), Some("r1"));
    }
}
