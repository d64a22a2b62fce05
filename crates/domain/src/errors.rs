//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Thermowatch
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ThermowatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// The stored session can no longer produce a token; the user has to log
    /// in again.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

impl ThermowatchError {
    /// Whether the UI layer should respond by showing a login prompt.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}

/// Result type alias for Thermowatch operations
pub type Result<T> = std::result::Result<T, ThermowatchError>;
