//! Auth orchestrator
//!
//! The single entry point collaborators use: interactive login, obtaining a
//! valid access token (refreshing transparently when it is about to expire)
//! and logout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{TokenExchangeClient, DEFAULT_HTTP_TIMEOUT};
use super::error::{AuthError, StoreError};
use super::pkce::{generate_code_challenge, generate_code_verifier};
use super::redirect::{RedirectListener, RedirectOutcome};
use super::store::{StorageKey, TokenStore};
use super::traits::{Clock, InteractiveAuthLauncher, SystemClock};
use super::types::{AuthSession, OAuthConfig};

/// Timing knobs for [`AuthService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthServiceOptions {
    /// Ceiling for one interactive login attempt
    pub login_timeout: Duration,
    /// Tokens expiring within this window are refreshed before use
    pub refresh_margin: Duration,
    /// Request timeout for token endpoint calls
    pub http_timeout: Duration,
}

impl Default for AuthServiceOptions {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(5 * 60),
            refresh_margin: Duration::from_secs(5 * 60),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// OAuth 2.0 PKCE authentication service
///
/// Owns the redirect listener; at most one interactive attempt runs at a
/// time and concurrent refreshes are serialised.
pub struct AuthService<S, L>
where
    S: TokenStore + ?Sized,
    L: InteractiveAuthLauncher + ?Sized,
{
    client: TokenExchangeClient<S>,
    store: Arc<S>,
    launcher: Arc<L>,
    listener: RedirectListener,
    clock: Arc<dyn Clock>,
    options: AuthServiceOptions,
    login_guard: Mutex<()>,
    refresh_lock: Mutex<()>,
}

impl<S, L> AuthService<S, L>
where
    S: TokenStore + ?Sized,
    L: InteractiveAuthLauncher + ?Sized,
{
    /// Create a service using the system clock and default timings
    pub fn new(config: OAuthConfig, store: Arc<S>, launcher: Arc<L>) -> Self {
        Self::with_options(
            config,
            store,
            launcher,
            Arc::new(SystemClock),
            AuthServiceOptions::default(),
        )
    }

    pub fn with_options(
        config: OAuthConfig,
        store: Arc<S>,
        launcher: Arc<L>,
        clock: Arc<dyn Clock>,
        options: AuthServiceOptions,
    ) -> Self {
        let client = TokenExchangeClient::with_timeout(
            config,
            Arc::clone(&store),
            Arc::clone(&clock),
            options.http_timeout,
        );

        Self {
            client,
            store,
            launcher,
            listener: RedirectListener::new(),
            clock,
            options,
            login_guard: Mutex::new(()),
            refresh_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        self.client.config()
    }

    #[must_use]
    pub fn options(&self) -> &AuthServiceOptions {
        &self.options
    }

    /// Run the interactive PKCE login
    ///
    /// Generates and persists a fresh verifier, opens the authorization page,
    /// waits for the redirect and exchanges the code. The verifier is
    /// discarded once the attempt ends.
    ///
    /// # Errors
    /// - [`AuthError::LoginInProgress`] if another attempt is running
    /// - [`AuthError::VerifierPersistence`] if the verifier cannot be stored
    /// - [`AuthError::BrowserLaunch`] if the surface cannot be opened
    /// - [`AuthError::RedirectCancelled`], [`AuthError::RedirectTimeout`],
    ///   [`AuthError::RedirectMissingCode`] for non-success redirects
    /// - token exchange errors from [`TokenExchangeClient`]
    pub async fn start_authentication(&self) -> Result<AuthSession, AuthError> {
        let Ok(_attempt) = self.login_guard.try_lock() else {
            warn!("Rejected login: another attempt is in progress");
            return Err(AuthError::LoginInProgress);
        };

        info!("Starting interactive authentication");
        let result = self.run_authentication().await;

        if !matches!(result, Err(AuthError::VerifierPersistence(_))) {
            if let Err(e) = self.store.remove(StorageKey::CodeVerifier).await {
                warn!(error = %e, "Failed to discard code verifier");
            }
        }

        match &result {
            Ok(_) => info!("Authentication completed"),
            Err(e) => warn!(error = %e, "Authentication failed"),
        }
        result
    }

    async fn run_authentication(&self) -> Result<AuthSession, AuthError> {
        let verifier = generate_code_verifier();
        self.store
            .set(StorageKey::CodeVerifier, &verifier)
            .await
            .map_err(AuthError::VerifierPersistence)?;

        let challenge = generate_code_challenge(&verifier);
        let auth_url = self.authorization_url(&challenge);
        let redirect_uri = self.config().redirect_uri.clone();

        let code = match self.run_interactive_auth(&auth_url, &redirect_uri).await? {
            RedirectOutcome::CodeReceived(code) => code,
            RedirectOutcome::Cancelled => return Err(AuthError::RedirectCancelled),
            RedirectOutcome::TimedOut => {
                return Err(AuthError::RedirectTimeout {
                    waited_secs: self.options.login_timeout.as_secs(),
                })
            }
            RedirectOutcome::MissingCode { error, error_description } => {
                return Err(AuthError::RedirectMissingCode { error, description: error_description })
            }
        };

        let stored_verifier = self.store.get(StorageKey::CodeVerifier).await?.ok_or_else(|| {
            AuthError::VerifierPersistence(StoreError::Backend(
                "code verifier missing from store".to_string(),
            ))
        })?;

        self.client.exchange_code_for_tokens(&code, &stored_verifier).await
    }

    /// Register, open, await and close, as one operation
    ///
    /// Shares the single-attempt guard with [`Self::start_authentication`].
    /// Any stale registration left by an abandoned attempt is replaced.
    ///
    /// # Errors
    /// - [`AuthError::LoginInProgress`] if another attempt is running
    /// - [`AuthError::BrowserLaunch`] if the surface cannot be opened; the
    ///   registration is removed in that case
    pub async fn launch_interactive_auth(
        &self,
        auth_url: &str,
        redirect_uri: &str,
    ) -> Result<RedirectOutcome, AuthError> {
        let Ok(_attempt) = self.login_guard.try_lock() else {
            warn!("Rejected interactive launch: another attempt is in progress");
            return Err(AuthError::LoginInProgress);
        };
        self.run_interactive_auth(auth_url, redirect_uri).await
    }

    // Caller holds `login_guard`
    async fn run_interactive_auth(
        &self,
        auth_url: &str,
        redirect_uri: &str,
    ) -> Result<RedirectOutcome, AuthError> {
        let pending = self.listener.register(redirect_uri, self.options.login_timeout);

        let mut session = match self.launcher.open(auth_url, redirect_uri, pending.sink()).await {
            Ok(session) => session,
            Err(e) => {
                self.listener.unregister();
                return Err(e);
            }
        };

        let outcome = pending.outcome().await;
        session.close().await;

        match &outcome {
            RedirectOutcome::CodeReceived(_) => debug!("Authorization code received"),
            RedirectOutcome::Cancelled => warn!("Authorization surface closed by user"),
            RedirectOutcome::TimedOut => warn!(
                timeout_secs = self.options.login_timeout.as_secs(),
                "No redirect before deadline"
            ),
            RedirectOutcome::MissingCode { error, .. } => {
                warn!(error = ?error, "Redirect did not carry an authorization code");
            }
        }
        Ok(outcome)
    }

    /// Return an access token valid beyond the refresh margin
    ///
    /// Refreshes when `now >= expiry - margin`. A caller that waited for
    /// another caller's refresh reuses its result.
    ///
    /// # Errors
    /// - [`AuthError::NoToken`] if no access token (with expiry) is stored
    /// - refresh errors ([`AuthError::NoRefreshToken`],
    ///   [`AuthError::TokenRefresh`]) when a refresh was needed
    pub async fn get_valid_access_token(&self) -> Result<String, AuthError> {
        let session = self.session().await?.ok_or(AuthError::NoToken)?;
        if !self.needs_refresh(&session) {
            return Ok(session.access_token);
        }

        let _refresh = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        let session = self.session().await?.ok_or(AuthError::NoToken)?;
        if !self.needs_refresh(&session) {
            debug!("Reusing access token refreshed by a concurrent caller");
            return Ok(session.access_token);
        }

        debug!(
            remaining_ms = session.remaining_ms(self.clock.millis_since_epoch()),
            "Access token within refresh margin"
        );
        self.client.refresh_access_token().await
    }

    /// Refresh unconditionally
    ///
    /// # Errors
    /// See [`TokenExchangeClient::refresh_access_token`].
    pub async fn refresh_access_token(&self) -> Result<String, AuthError> {
        let _refresh = self.refresh_lock.lock().await;
        self.client.refresh_access_token().await
    }

    /// Clear all tokens and any pending redirect registration
    ///
    /// Idempotent.
    ///
    /// # Errors
    /// Returns [`AuthError::Storage`] if the store cannot be cleared.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.listener.unregister();
        self.store.clear_all().await?;
        info!("Logged out");
        Ok(())
    }

    /// Current persisted tokens, without refreshing
    ///
    /// An access token without a parseable expiry counts as absent.
    ///
    /// # Errors
    /// Returns [`AuthError::Storage`] on read failure.
    pub async fn session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(access_token) = self.store.get(StorageKey::AccessToken).await? else {
            return Ok(None);
        };
        let expiry = self.store.get(StorageKey::TokenExpiry).await?;
        let Some(expires_at_ms) = expiry.as_deref().and_then(|raw| raw.trim().parse::<u64>().ok())
        else {
            debug!("Access token without a usable expiry; treating as absent");
            return Ok(None);
        };
        let refresh_token = self.store.get(StorageKey::RefreshToken).await?;

        Ok(Some(AuthSession { access_token, expires_at_ms, refresh_token }))
    }

    /// Whether a valid access token can be obtained (refreshing if needed)
    pub async fn is_authenticated(&self) -> bool {
        match self.get_valid_access_token().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Not authenticated");
                false
            }
        }
    }

    /// Whether an interactive attempt is waiting for its redirect
    #[must_use]
    pub fn has_pending_login(&self) -> bool {
        self.listener.is_registered()
    }

    /// Authorization page URL for `code_challenge`
    #[must_use]
    pub fn authorization_url(&self, code_challenge: &str) -> String {
        self.client.authorization_url(code_challenge)
    }

    fn needs_refresh(&self, session: &AuthSession) -> bool {
        let margin_ms = u64::try_from(self.options.refresh_margin.as_millis()).unwrap_or(u64::MAX);
        session.needs_refresh(self.clock.millis_since_epoch(), margin_ms)
    }
}
