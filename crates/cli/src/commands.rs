//! Subcommand handlers
//!
//! Each handler prints its result on stdout; diagnostics go through
//! `tracing` to stderr.

use chrono::{DateTime, Local};
use thermowatch_common::auth::{AuthError, AuthSession, Clock, SystemClock};
use thermowatch_domain::{Config, ThermowatchError};
use thermowatch_infra::{AppAuthService, InfraError};

/// Auth failures leave the CLI as domain errors so `main` can spot the
/// "log in again" case
fn app_error(err: AuthError) -> anyhow::Error {
    ThermowatchError::from(InfraError::from(err)).into()
}

pub async fn login(service: &AppAuthService) -> anyhow::Result<()> {
    println!("Opening the authorization page in your browser...");
    let session = service.start_authentication().await.map_err(app_error)?;
    println!("Logged in. {}", describe_expiry(&session, SystemClock.millis_since_epoch()));
    Ok(())
}

pub async fn token(service: &AppAuthService) -> anyhow::Result<()> {
    let token = service.get_valid_access_token().await.map_err(app_error)?;
    println!("{token}");
    Ok(())
}

pub async fn logout(service: &AppAuthService) -> anyhow::Result<()> {
    service.logout().await.map_err(app_error)?;
    println!("Logged out.");
    Ok(())
}

pub async fn status(service: &AppAuthService, config: &Config) -> anyhow::Result<()> {
    println!("Authorization server: {}", config.auth.server_base_url);
    println!("Redirect URI:         {}", config.auth.redirect_uri);
    println!("Token storage:        {}", describe_storage(config));

    match service.session().await.map_err(app_error)? {
        None => println!("Status:               not logged in"),
        Some(session) => {
            let now_ms = SystemClock.millis_since_epoch();
            println!("Status:               logged in");
            println!("Access token:         {}", describe_expiry(&session, now_ms));
            println!(
                "Refresh token:        {}",
                if session.refresh_token.is_some() { "stored" } else { "none" }
            );
        }
    }
    Ok(())
}

fn describe_storage(config: &Config) -> String {
    use thermowatch_domain::StorageBackend;

    match config.storage.backend {
        StorageBackend::File => format!("file ({})", config.storage.path),
        StorageBackend::Keychain => format!("keychain ({})", config.storage.keychain_service),
        StorageBackend::Memory => "memory (not persisted)".to_string(),
    }
}

fn describe_expiry(session: &AuthSession, now_ms: u64) -> String {
    let remaining_ms = session.remaining_ms(now_ms);
    let at = i64::try_from(session.expires_at_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| session.expires_at_ms.to_string());

    if remaining_ms == 0 {
        format!("expired at {at}")
    } else {
        format!("expires at {at} (in {} min)", remaining_ms / 60_000)
    }
}
