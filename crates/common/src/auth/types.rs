//! OAuth 2.0 types and structures
//!
//! Wire shapes for the token endpoint, the authorization server
//! configuration and the read view over persisted tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifetime assumed when a token response omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Currently persisted tokens
///
/// Only exists when both the access token and a parseable expiry are
/// present; an access token without an expiry is treated as absent.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,

    /// Expiry as milliseconds since the UNIX epoch
    pub expires_at_ms: u64,

    pub refresh_token: Option<String>,
}

impl AuthSession {
    /// Whether the token is expired or expires within `margin_ms`
    ///
    /// Refresh is due when `now >= expiry - margin`.
    #[must_use]
    pub fn needs_refresh(&self, now_ms: u64, margin_ms: u64) -> bool {
        now_ms >= self.expires_at_ms.saturating_sub(margin_ms)
    }

    /// Milliseconds left before expiry (zero once expired)
    #[must_use]
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }
}

// Tokens never reach logs through Debug.
impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// OAuth token response from the authorization server
///
/// Every field is optional on the wire; a success response without
/// `access_token` is reported by the exchange client.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Token lifetime, falling back to one hour
    #[must_use]
    pub fn lifetime_secs(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }
}

/// OAuth error response body (RFC 6749 §5.2)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

/// OAuth configuration for the authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    /// Base URL of the authorization server, e.g. `https://iam.viessmann.com`
    pub server_base_url: String,

    pub client_id: String,

    /// Redirect URI registered with the server (loopback or custom scheme)
    pub redirect_uri: String,

    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        server_base_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            server_base_url: server_base_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
        }
    }

    /// Authorization endpoint: `{base}/idp/v3/authorize`
    #[must_use]
    pub fn authorization_url(&self) -> String {
        format!("{}/idp/v3/authorize", self.base())
    }

    /// Token endpoint: `{base}/idp/v3/token`
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/idp/v3/token", self.base())
    }

    /// Scopes joined with single spaces
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    fn base(&self) -> &str {
        self.server_base_url.trim_end_matches('/')
    }
}
