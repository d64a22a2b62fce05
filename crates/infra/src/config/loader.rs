//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `THERMOWATCH_CLIENT_ID` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `THERMOWATCH_CLIENT_ID`: OAuth client id (required)
//! - `THERMOWATCH_REDIRECT_URI`: Registered redirect URI
//! - `THERMOWATCH_AUTH_SERVER`: Authorization server base URL
//! - `THERMOWATCH_SCOPES`: Space- or comma-separated scope list
//! - `THERMOWATCH_STORAGE_BACKEND`: `keychain`, `file` or `memory`
//! - `THERMOWATCH_STORAGE_PATH`: Token file path (file backend)
//! - `THERMOWATCH_LOG_LEVEL`: `EnvFilter` directive
//! - `THERMOWATCH_LOG_FORMAT`: `pretty` or `json`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./thermowatch.toml` or `./thermowatch.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names one and two directories up
//! 4. Relative to executable location

use std::path::{Path, PathBuf};

use thermowatch_domain::{Config, LogFormat, Result, StorageBackend, ThermowatchError};

const CONFIG_FILE_NAMES: &[&str] =
    &["thermowatch.toml", "thermowatch.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the client id is
/// not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `ThermowatchError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `THERMOWATCH_CLIENT_ID` is required; everything else falls back to
/// the defaults in [`thermowatch_domain::config`].
///
/// # Errors
/// Returns `ThermowatchError::Config` if the client id is missing or a value
/// cannot be parsed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::with_client_id(env_var("THERMOWATCH_CLIENT_ID")?);

    if let Some(uri) = env_opt("THERMOWATCH_REDIRECT_URI") {
        config.auth.redirect_uri = uri;
    }
    if let Some(server) = env_opt("THERMOWATCH_AUTH_SERVER") {
        config.auth.server_base_url = server;
    }
    if let Some(scopes) = env_opt("THERMOWATCH_SCOPES") {
        config.auth.scopes = parse_scopes(&scopes)?;
    }

    if let Some(backend) = env_opt("THERMOWATCH_STORAGE_BACKEND") {
        config.storage.backend = backend.parse::<StorageBackend>()?;
    }
    if let Some(path) = env_opt("THERMOWATCH_STORAGE_PATH") {
        config.storage.path = path;
    }

    if let Some(level) = env_opt("THERMOWATCH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_opt("THERMOWATCH_LOG_FORMAT") {
        config.logging.format = format.parse::<LogFormat>()?;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ThermowatchError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ThermowatchError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ThermowatchError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ThermowatchError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `ThermowatchError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let config: Config = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ThermowatchError::Config(format!("Invalid TOML format: {e}")))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| ThermowatchError::Config(format!("Invalid JSON format: {e}")))?,
        _ => {
            return Err(ThermowatchError::Config(format!(
                "Unsupported config format: {extension}"
            )))
        }
    };

    validate(&config)?;
    Ok(config)
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its two nearest ancestors, and
/// the same three levels relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| [root.clone(), root.join(".."), root.join("../..")])
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn validate(config: &Config) -> Result<()> {
    if config.auth.client_id.trim().is_empty() {
        return Err(ThermowatchError::Config("auth.client_id must not be empty".into()));
    }
    if config.auth.redirect_uri.trim().is_empty() {
        return Err(ThermowatchError::Config("auth.redirect_uri must not be empty".into()));
    }
    Ok(())
}

/// Split a scope list on spaces or commas
///
/// Scope names may themselves contain spaces (`IoT User`), so commas win
/// when present.
fn parse_scopes(raw: &str) -> Result<Vec<String>> {
    let scopes: Vec<String> = if raw.contains(',') {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
    } else {
        raw.split_whitespace().map(String::from).collect()
    };

    if scopes.is_empty() {
        return Err(ThermowatchError::Config("THERMOWATCH_SCOPES is empty".into()));
    }
    Ok(scopes)
}

/// Get required environment variable
///
/// # Errors
/// Returns `ThermowatchError::Config` if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        ThermowatchError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
