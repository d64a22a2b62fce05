//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Authorization server
pub const DEFAULT_AUTH_SERVER: &str = "https://iam.viessmann.com";
pub const DEFAULT_SCOPES: &[&str] = &["IoT User", "offline_access"];

// Redirect URIs (must be registered with the authorization server)
pub const LOOPBACK_REDIRECT_URI: &str = "http://localhost:8081";
pub const NATIVE_REDIRECT_URI: &str = "thermowatch://oauth2";

// Token lifecycle
pub const LOGIN_TIMEOUT_SECS: u64 = 5 * 60;
pub const REFRESH_MARGIN_SECS: u64 = 5 * 60;
pub const HTTP_TIMEOUT_SECS: u64 = 30;

// Storage backends
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "thermowatch.auth";
pub const APP_DATA_DIR: &str = "thermowatch";
pub const DEFAULT_TOKEN_FILE: &str = "tokens.json";
