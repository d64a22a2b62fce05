//! Configuration structures
//!
//! Deserialised from TOML/JSON files or assembled from environment variables
//! by the infrastructure loader. Every section except `auth.client_id` has a
//! usable default.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    APP_DATA_DIR, DEFAULT_AUTH_SERVER, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_SCOPES, DEFAULT_TOKEN_FILE,
    HTTP_TIMEOUT_SECS, LOGIN_TIMEOUT_SECS, LOOPBACK_REDIRECT_URI, REFRESH_MARGIN_SECS,
};
use crate::errors::ThermowatchError;

/// Root application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Config {
    /// Configuration with defaults everywhere except the client id.
    #[must_use]
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            auth: AuthSettings::new(client_id),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// OAuth client registration and token lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Base URL of the authorization server (scheme + host, no path)
    #[serde(default = "default_server_base_url")]
    pub server_base_url: String,

    /// OAuth client ID registered with the authorization server
    pub client_id: String,

    /// Redirect URI; must match the registration byte-for-byte
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Ceiling for one interactive login attempt
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    /// Tokens expiring within this window are refreshed before use
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl AuthSettings {
    /// Settings with defaults for everything but the client id.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            server_base_url: default_server_base_url(),
            client_id: client_id.into(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            login_timeout_secs: default_login_timeout_secs(),
            refresh_margin_secs: default_refresh_margin_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Where the token store keeps its four keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Token file path for the `file` backend
    #[serde(default = "default_token_file")]
    pub path: String,

    /// Keychain service name for the `keychain` backend
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_token_file(),
            keychain_service: default_keychain_service(),
        }
    }
}

/// Token store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Platform keychain (macOS Keychain, Windows Credential Manager, Linux
    /// kernel keyring)
    Keychain,
    /// JSON file on disk
    #[default]
    File,
    /// Process memory only; nothing survives a restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ThermowatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keychain" => Ok(Self::Keychain),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(ThermowatchError::Config(format!("unknown storage backend: {other}"))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Keychain => "keychain",
            Self::File => "file",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `thermowatch_common=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::default() }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ThermowatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ThermowatchError::Config(format!("unknown log format: {other}"))),
        }
    }
}

fn default_server_base_url() -> String {
    DEFAULT_AUTH_SERVER.to_string()
}

fn default_redirect_uri() -> String {
    LOOPBACK_REDIRECT_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect()
}

const fn default_login_timeout_secs() -> u64 {
    LOGIN_TIMEOUT_SECS
}

const fn default_refresh_margin_secs() -> u64 {
    REFRESH_MARGIN_SECS
}

const fn default_http_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}

/// `<data_local_dir>/thermowatch/tokens.json`, falling back to
/// `~/.thermowatch/tokens.json` when the platform has no data directory
fn default_token_file() -> String {
    let dir = match dirs::data_local_dir() {
        Some(base) => base.join(APP_DATA_DIR),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{APP_DATA_DIR}")),
    };
    dir.join(DEFAULT_TOKEN_FILE).display().to_string()
}

fn default_keychain_service() -> String {
    DEFAULT_KEYCHAIN_SERVICE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[auth]
client_id = "abc"
"#,
        )
        .unwrap();

        assert_eq!(config.auth.client_id, "abc");
        assert_eq!(config.auth.server_base_url, "https://iam.viessmann.com");
        assert_eq!(config.auth.redirect_uri, "http://localhost:8081");
        assert_eq!(config.auth.scopes, vec!["IoT User".to_string(), "offline_access".to_string()]);
        assert_eq!(config.auth.login_timeout_secs, 300);
        assert_eq!(config.auth.refresh_margin_secs, 300);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn default_token_file_is_per_user_and_absolute() {
        let settings = StorageSettings::default();
        let path = PathBuf::from(&settings.path);

        assert!(path.is_absolute(), "default token file must not depend on cwd: {path:?}");
        assert!(
            path.ends_with("thermowatch/tokens.json") || path.ends_with(".thermowatch/tokens.json")
        );
    }

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("Keychain".parse::<StorageBackend>().unwrap(), StorageBackend::Keychain);
        assert_eq!(" memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn json_backend_names_are_lowercase() {
        let settings: StorageSettings =
            serde_json::from_str(r#"{"backend":"keychain"}"#).unwrap();
        assert_eq!(settings.backend, StorageBackend::Keychain);
        assert_eq!(settings.keychain_service, "thermowatch.auth");
    }
}
