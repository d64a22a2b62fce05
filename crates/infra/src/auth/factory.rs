//! Builds the auth service from application configuration

use std::sync::Arc;
use std::time::Duration;

use thermowatch_common::auth::{
    AuthService, AuthServiceOptions, InteractiveAuthLauncher, KeychainTokenStore,
    MemoryTokenStore, OAuthConfig, SystemClock, TokenStore,
};
use thermowatch_domain::{
    AuthSettings, Config, Result, StorageBackend, StorageSettings, ThermowatchError,
};
use tracing::info;

use crate::storage::FileTokenStore;

/// Auth service with the backend and launcher chosen at runtime
pub type AppAuthService = AuthService<dyn TokenStore, dyn InteractiveAuthLauncher>;

/// Server registration from the `[auth]` section
#[must_use]
pub fn oauth_config(settings: &AuthSettings) -> OAuthConfig {
    OAuthConfig::new(
        settings.server_base_url.clone(),
        settings.client_id.clone(),
        settings.redirect_uri.clone(),
        settings.scopes.clone(),
    )
}

/// Timing knobs from the `[auth]` section
#[must_use]
pub fn service_options(settings: &AuthSettings) -> AuthServiceOptions {
    AuthServiceOptions {
        login_timeout: Duration::from_secs(settings.login_timeout_secs),
        refresh_margin: Duration::from_secs(settings.refresh_margin_secs),
        http_timeout: Duration::from_secs(settings.http_timeout_secs),
    }
}

/// Token store for the configured backend
#[must_use]
pub fn build_token_store(settings: &StorageSettings) -> Arc<dyn TokenStore> {
    match settings.backend {
        StorageBackend::Keychain => {
            Arc::new(KeychainTokenStore::for_service(settings.keychain_service.clone()))
        }
        StorageBackend::File => Arc::new(FileTokenStore::new(settings.path.clone())),
        StorageBackend::Memory => Arc::new(MemoryTokenStore::new()),
    }
}

/// Wire an [`AppAuthService`] from configuration
///
/// # Errors
/// Returns `ThermowatchError::Config` if a timeout is zero or the client id
/// is empty.
pub fn build_auth_service(
    config: &Config,
    launcher: Arc<dyn InteractiveAuthLauncher>,
) -> Result<AppAuthService> {
    validate_auth(&config.auth)?;

    let store = build_token_store(&config.storage);
    info!(
        backend = %config.storage.backend,
        redirect_uri = %config.auth.redirect_uri,
        "Auth service configured"
    );

    Ok(AuthService::with_options(
        oauth_config(&config.auth),
        store,
        launcher,
        Arc::new(SystemClock),
        service_options(&config.auth),
    ))
}

fn validate_auth(settings: &AuthSettings) -> Result<()> {
    if settings.client_id.trim().is_empty() {
        return Err(ThermowatchError::Config("auth.client_id must not be empty".into()));
    }
    if settings.login_timeout_secs == 0 || settings.http_timeout_secs == 0 {
        return Err(ThermowatchError::Config(
            "auth.login_timeout_secs and auth.http_timeout_secs must be positive".into(),
        ));
    }
    Ok(())
}
