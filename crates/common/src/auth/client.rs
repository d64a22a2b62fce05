//! Token endpoint client
//!
//! Performs the two grant types against the authorization server's token
//! endpoint and persists the results:
//! - `authorization_code` (with the PKCE verifier) after an interactive login
//! - `refresh_token` when the access token is about to expire
//!
//! Writes are paired: the access token and its expiry go through a single
//! `set_many`, the refresh token follows only when the server sent one.
//! Stored tokens are never cleared on failure.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::store::{StorageKey, TokenStore};
use super::traits::Clock;
use super::types::{AuthSession, OAuthConfig, OAuthErrorBody, TokenResponse};

/// Default request timeout for token endpoint calls
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure talking to the token endpoint, before it is attributed to a grant
#[derive(Debug)]
struct EndpointFailure {
    status: Option<u16>,
    message: String,
}

/// OAuth token endpoint client bound to a token store
pub struct TokenExchangeClient<S: TokenStore + ?Sized> {
    config: OAuthConfig,
    http: Client,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: TokenStore + ?Sized> TokenExchangeClient<S> {
    /// Create a client with the default 30 second request timeout
    pub fn new(config: OAuthConfig, store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(config, store, clock, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(
        config: OAuthConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new());
        Self { config, http, store, clock }
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the browser authorization URL for `code_challenge`
    ///
    /// `{authorize}?client_id&redirect_uri&scope&response_type=code
    /// &code_challenge_method=S256&code_challenge`, every value
    /// percent-encoded.
    #[must_use]
    pub fn authorization_url(&self, code_challenge: &str) -> String {
        let scope = self.config.scope_string();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("response_type", "code"),
            ("code_challenge_method", "S256"),
            ("code_challenge", code_challenge),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.authorization_url(), query)
    }

    /// Exchange an authorization code for tokens and persist them
    ///
    /// # Errors
    /// - [`AuthError::TokenExchange`] on transport failure, non-2xx status
    ///   or an unparseable body
    /// - [`AuthError::TokenExchangeMissingToken`] on 2xx without
    ///   `access_token`
    /// - [`AuthError::Storage`] if persisting fails
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, AuthError> {
        debug!(token_url = %self.config.token_url(), "Exchanging authorization code");

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
            ("code", code),
        ];

        let response = self.post_token_request(&params).await.map_err(|failure| {
            warn!(status = ?failure.status, "Authorization code exchange failed");
            AuthError::TokenExchange { status: failure.status, message: failure.message }
        })?;

        let Some(access_token) = response.access_token.as_deref() else {
            return Err(AuthError::TokenExchangeMissingToken);
        };

        let session = self.persist(&response, access_token, None).await?;
        info!(expires_at_ms = session.expires_at_ms, "Authorization code exchanged for tokens");
        Ok(session)
    }

    /// Obtain a new access token with the stored refresh token
    ///
    /// The stored refresh token is replaced only when the response carries
    /// a new one. Returns the new access token.
    ///
    /// # Errors
    /// - [`AuthError::NoRefreshToken`] if none is stored
    /// - [`AuthError::TokenRefresh`] on transport failure, non-2xx status,
    ///   malformed body or a body without `access_token`
    /// - [`AuthError::Storage`] if reading or persisting fails
    pub async fn refresh_access_token(&self) -> Result<String, AuthError> {
        let refresh_token = self
            .store
            .get(StorageKey::RefreshToken)
            .await?
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::NoRefreshToken)?;

        debug!(token_url = %self.config.token_url(), "Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];

        let response = self.post_token_request(&params).await.map_err(|failure| {
            warn!(status = ?failure.status, "Token refresh failed");
            AuthError::TokenRefresh { status: failure.status, message: failure.message }
        })?;

        let Some(access_token) = response.access_token.as_deref() else {
            warn!("Token refresh response did not contain an access token");
            return Err(AuthError::TokenRefresh {
                status: None,
                message: "token response did not contain an access token".to_string(),
            });
        };

        let session = self.persist(&response, access_token, Some(refresh_token)).await?;
        info!(
            expires_at_ms = session.expires_at_ms,
            rotated_refresh_token = response.refresh_token.is_some(),
            "Access token refreshed"
        );
        Ok(session.access_token)
    }

    async fn post_token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, EndpointFailure> {
        let response =
            self.http.post(self.config.token_url()).form(params).send().await.map_err(|e| {
                EndpointFailure { status: None, message: format!("request failed: {e}") }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| EndpointFailure {
            status: Some(status.as_u16()),
            message: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(error) => error.to_string(),
                Err(_) => status.canonical_reason().unwrap_or("unexpected status").to_string(),
            };
            return Err(EndpointFailure { status: Some(status.as_u16()), message });
        }

        serde_json::from_str(&body).map_err(|e| EndpointFailure {
            status: Some(status.as_u16()),
            message: format!("malformed token response: {e}"),
        })
    }

    async fn persist(
        &self,
        response: &TokenResponse,
        access_token: &str,
        previous_refresh_token: Option<String>,
    ) -> Result<AuthSession, AuthError> {
        let now_ms = self.clock.millis_since_epoch();
        let expires_at_ms = now_ms.saturating_add(response.lifetime_secs().saturating_mul(1000));

        self.store
            .set_many(&[
                (StorageKey::AccessToken, access_token.to_string()),
                (StorageKey::TokenExpiry, expires_at_ms.to_string()),
            ])
            .await?;

        if let Some(refresh_token) = &response.refresh_token {
            self.store.set(StorageKey::RefreshToken, refresh_token).await?;
        }

        Ok(AuthSession {
            access_token: access_token.to_string(),
            expires_at_ms,
            refresh_token: response.refresh_token.clone().or(previous_refresh_token),
        })
    }
}
