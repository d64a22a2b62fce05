//! Generic keychain provider for secure credential storage
//!
//! A thin wrapper over the platform keychain for storing arbitrary secrets
//! on macOS (Keychain Access), Windows (Credential Manager) and Linux
//! (kernel keyutils).
//!
//! ## Usage
//!
//! ```no_run
//! use thermowatch_common::security::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("thermowatch.auth");
//! keychain.set_secret("refresh_token", "super-secret")?;
//! let secret = keychain.get_secret("refresh_token")?;
//! assert_eq!(secret, "super-secret");
//! # Ok::<(), thermowatch_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Keychain provider scoped to one service name
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Examples
    /// ```
    /// use thermowatch_common::security::KeychainProvider;
    ///
    /// let keychain = KeychainProvider::new("thermowatch.auth");
    /// assert_eq!(keychain.service_name(), "thermowatch.auth");
    /// ```
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a secret value in the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })?;

        Ok(())
    }

    /// Retrieve a secret value from the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if secret doesn't exist
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                KeychainError::NotFound
            } else {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {e}"))
            }
        })
    }

    /// Delete a secret from the platform keychain (idempotent)
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }

    fn create_entry(&self, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, key).map_err(KeychainError::Keyring)
    }
}

/// Keychain operation errors
#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    #[error("Secret not found in keychain")]
    NotFound,

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}
