//! Authentication error taxonomy

use thiserror::Error;

/// Token store failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store (keychain, database, ...) rejected the operation
    #[error("token store backend error: {0}")]
    Backend(String),

    #[error("token store serialization error: {0}")]
    Serialization(String),

    #[error("token store I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors surfaced by the authentication core
///
/// Every failure is returned to the caller. The only internal recovery is
/// the expiry-triggered refresh inside `get_valid_access_token`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("failed to persist PKCE code verifier: {0}")]
    VerifierPersistence(StoreError),

    #[error("failed to open authorization page: {0}")]
    BrowserLaunch(String),

    #[error("authentication was cancelled")]
    RedirectCancelled,

    #[error("Authentication timed out after {}", format_wait(.waited_secs))]
    RedirectTimeout { waited_secs: u64 },

    #[error("No code found in redirect URL{}", format_server_error(.error.as_deref(), .description.as_deref()))]
    RedirectMissingCode { error: Option<String>, description: Option<String> },

    #[error("token exchange failed{}: {message}", format_status(.status))]
    TokenExchange { status: Option<u16>, message: String },

    #[error("token response did not contain an access token")]
    TokenExchangeMissingToken,

    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("token refresh failed{}: {message}", format_status(.status))]
    TokenRefresh { status: Option<u16>, message: String },

    #[error("no access token available")]
    NoToken,

    #[error("an authentication attempt is already in progress")]
    LoginInProgress,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("invalid auth configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether the caller must run an interactive login to recover
    ///
    /// This is the "session expired" signal: no token, nothing to refresh
    /// with, or the server rejected the refresh.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::NoToken | Self::NoRefreshToken | Self::TokenRefresh { .. })
    }
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

fn format_wait(secs: &u64) -> String {
    match *secs {
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}

fn format_server_error(error: Option<&str>, description: Option<&str>) -> String {
    match (error, description) {
        (Some(error), Some(description)) => format!(" ({error}: {description})"),
        (Some(error), None) => format!(" ({error})"),
        (None, Some(description)) => format!(" ({description})"),
        (None, None) => String::new(),
    }
}
