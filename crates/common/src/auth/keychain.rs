//! Keychain-backed token store
//!
//! One keychain entry per storage key under a single service name.

use async_trait::async_trait;

use super::error::StoreError;
use super::store::{StorageKey, TokenStore};
use crate::security::{KeychainError, KeychainProvider};

/// [`TokenStore`] over the platform keychain
///
/// Keyring calls are synchronous; each is short and runs inline.
#[derive(Debug, Clone)]
pub struct KeychainTokenStore {
    keychain: KeychainProvider,
}

impl KeychainTokenStore {
    #[must_use]
    pub fn new(keychain: KeychainProvider) -> Self {
        Self { keychain }
    }

    /// Store under the given keychain service name
    #[must_use]
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self::new(KeychainProvider::new(service_name))
    }
}

impl From<KeychainError> for StoreError {
    fn from(err: KeychainError) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
impl TokenStore for KeychainTokenStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        match self.keychain.get_secret(key.as_str()) {
            Ok(value) => Ok(Some(value)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        Ok(self.keychain.set_secret(key.as_str(), value)?)
    }

    async fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        Ok(self.keychain.delete_secret(key.as_str())?)
    }
}
