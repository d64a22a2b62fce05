//! Integration tests for the auth module
//!
//! Drives `AuthService` end to end against a wiremock token endpoint, a
//! scripted browser surface and an in-memory token store.

#![cfg(all(feature = "platform", feature = "test-utils"))]

use std::sync::Arc;
use std::time::Duration;

use thermowatch_common::auth::{
    generate_code_challenge, AuthError, AuthService, AuthServiceOptions, MemoryTokenStore,
    OAuthConfig, StorageKey, TokenStore,
};
use thermowatch_common::testing::{LaunchScript, MockClock, ScriptedLauncher};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW_MS: u64 = 1_700_000_000_000;
const REDIRECT_URI: &str = "http://localhost:8081";
const MINUTE_MS: u64 = 60 * 1000;

struct Harness {
    server: MockServer,
    store: Arc<MemoryTokenStore>,
    launcher: Arc<ScriptedLauncher>,
    clock: MockClock,
    service: Arc<AuthService<MemoryTokenStore, ScriptedLauncher>>,
}

async fn harness(script: LaunchScript) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("thermowatch_common=debug")
        .with_test_writer()
        .try_init();

    let server = MockServer::start().await;
    let config = OAuthConfig::new(
        server.uri(),
        "client123",
        REDIRECT_URI,
        vec!["IoT User".to_string(), "offline_access".to_string()],
    );
    let store = Arc::new(MemoryTokenStore::new());
    let launcher = Arc::new(ScriptedLauncher::new(script));
    let clock = MockClock::at_millis(NOW_MS);
    let service = Arc::new(AuthService::with_options(
        config,
        Arc::clone(&store),
        Arc::clone(&launcher),
        Arc::new(clock.clone()),
        AuthServiceOptions::default(),
    ));

    Harness { server, store, launcher, clock, service }
}

async fn seed_tokens(store: &MemoryTokenStore, access: &str, refresh: &str, expires_at_ms: u64) {
    store
        .set_many(&[
            (StorageKey::AccessToken, access.to_string()),
            (StorageKey::TokenExpiry, expires_at_ms.to_string()),
            (StorageKey::RefreshToken, refresh.to_string()),
        ])
        .await
        .unwrap();
}

async fn stored(store: &MemoryTokenStore, key: StorageKey) -> Option<String> {
    store.get(key).await.unwrap()
}

fn form_value(body: &[u8], key: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn query_value(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Scenario A: a fresh install has no token.
///
/// # Test Steps
/// 1. Build a service over an empty store
/// 2. Request a valid access token
/// 3. Verify `NoToken` and that it signals a required login
#[tokio::test(flavor = "multi_thread")]
async fn test_fresh_install_requires_login() {
    let h = harness(LaunchScript::Close).await;

    let err = h.service.get_valid_access_token().await.unwrap_err();

    assert_eq!(err, AuthError::NoToken);
    assert!(err.requires_login());
}

/// Scenario B: interactive login exchanges the code with the stored verifier.
///
/// # Test Steps
/// 1. Script the surface to land on `{redirect}?code=abc123`
/// 2. Run `start_authentication`
/// 3. Verify the token request carried the code and the verifier whose
///    challenge was sent in the authorization URL
/// 4. Verify access token, expiry (now + 3600 s) and refresh token are stored
/// 5. Verify the next `get_valid_access_token` returns `tok1` without refresh
#[tokio::test(flavor = "multi_thread")]
async fn test_login_exchanges_code_and_persists_tokens() {
    let h = harness(LaunchScript::Navigate(vec![
        "https://iam.example/idp/v3/login".to_string(),
        format!("{REDIRECT_URI}/?code=abc123"),
    ]))
    .await;

    Mock::given(method("POST"))
        .and(path("/idp/v3/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok1",
            "refresh_token": "r1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let session = h.service.start_authentication().await.unwrap();
    assert_eq!(session.access_token, "tok1");

    // The verifier sent to the token endpoint matches the challenge in the URL
    let requests = h.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let verifier = form_value(&requests[0].body, "code_verifier").unwrap();
    assert_eq!(verifier.len(), 43);
    assert_eq!(form_value(&requests[0].body, "redirect_uri").as_deref(), Some(REDIRECT_URI));
    assert_eq!(form_value(&requests[0].body, "client_id").as_deref(), Some("client123"));

    let opened = h.launcher.opened_urls();
    assert_eq!(opened.len(), 1);
    assert_eq!(query_value(&opened[0], "code_challenge"), Some(generate_code_challenge(&verifier)));
    assert_eq!(query_value(&opened[0], "code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(query_value(&opened[0], "response_type").as_deref(), Some("code"));
    assert_eq!(query_value(&opened[0], "scope").as_deref(), Some("IoT User offline_access"));

    assert_eq!(stored(&h.store, StorageKey::AccessToken).await.as_deref(), Some("tok1"));
    assert_eq!(
        stored(&h.store, StorageKey::TokenExpiry).await,
        Some((NOW_MS + 3_600_000).to_string())
    );
    assert_eq!(stored(&h.store, StorageKey::RefreshToken).await.as_deref(), Some("r1"));
    assert_eq!(stored(&h.store, StorageKey::CodeVerifier).await, None);
    assert_eq!(h.launcher.close_count(), 1);
    assert!(!h.service.has_pending_login());

    assert_eq!(h.service.get_valid_access_token().await.unwrap(), "tok1");
}

/// Scenario C: a token 4 minutes from expiry is refreshed, keeping `r1`.
///
/// # Test Steps
/// 1. Seed `tok1`/`r1` expiring in 4 minutes
/// 2. Answer the refresh with `tok2` and no refresh token
/// 3. Verify `tok2` is returned and stored, and `r1` is kept
#[tokio::test(flavor = "multi_thread")]
async fn test_refresh_within_margin_keeps_refresh_token() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok1", "r1", NOW_MS + 4 * MINUTE_MS).await;

    Mock::given(method("POST"))
        .and(path("/idp/v3/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": "tok2", "expires_in": 3600 })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    assert_eq!(h.service.get_valid_access_token().await.unwrap(), "tok2");
    assert_eq!(stored(&h.store, StorageKey::AccessToken).await.as_deref(), Some("tok2"));
    assert_eq!(stored(&h.store, StorageKey::RefreshToken).await.as_deref(), Some("r1"));
    assert_eq!(
        stored(&h.store, StorageKey::TokenExpiry).await,
        Some((NOW_MS + 3_600_000).to_string())
    );
}

/// A token 6 minutes from expiry is returned without touching the network.
#[tokio::test(flavor = "multi_thread")]
async fn test_token_outside_margin_is_not_refreshed() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok1", "r1", NOW_MS + 6 * MINUTE_MS).await;

    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&h.server).await;

    assert_eq!(h.service.get_valid_access_token().await.unwrap(), "tok1");
}

/// Advancing the clock moves a token into the refresh margin.
///
/// # Test Steps
/// 1. Seed a token valid for one hour; no refresh happens
/// 2. Advance the clock by 56 minutes
/// 3. Verify the next call refreshes
#[tokio::test(flavor = "multi_thread")]
async fn test_clock_advance_triggers_refresh() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok1", "r1", NOW_MS + 60 * MINUTE_MS).await;

    Mock::given(method("POST"))
        .and(path("/idp/v3/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": "tok2" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    assert_eq!(h.service.get_valid_access_token().await.unwrap(), "tok1");

    h.clock.advance(Duration::from_secs(56 * 60));
    assert_eq!(h.service.get_valid_access_token().await.unwrap(), "tok2");
}

/// Concurrent callers share a single refresh.
///
/// # Test Steps
/// 1. Seed a token inside the margin
/// 2. Delay the token endpoint so both callers overlap
/// 3. Verify exactly one refresh request and both callers get `tok2`
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_refresh_is_serialised() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok1", "r1", NOW_MS + MINUTE_MS).await;

    Mock::given(method("POST"))
        .and(path("/idp/v3/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "access_token": "tok2", "expires_in": 3600 }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b) =
        tokio::join!(h.service.get_valid_access_token(), h.service.get_valid_access_token());

    assert_eq!(a.unwrap(), "tok2");
    assert_eq!(b.unwrap(), "tok2");
}

/// Scenario D: closing the surface cancels the login and keeps tokens.
#[tokio::test(flavor = "multi_thread")]
async fn test_closing_surface_cancels_login() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok0", "r0", NOW_MS + 60 * MINUTE_MS).await;

    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&h.server).await;

    let err = h.service.start_authentication().await.unwrap_err();

    assert_eq!(err, AuthError::RedirectCancelled);
    assert_eq!(stored(&h.store, StorageKey::AccessToken).await.as_deref(), Some("tok0"));
    assert_eq!(stored(&h.store, StorageKey::RefreshToken).await.as_deref(), Some("r0"));
    assert_eq!(h.launcher.close_count(), 1);
    assert!(!h.service.has_pending_login());
}

/// Scenario E: a rejected refresh surfaces `TokenRefresh` and keeps tokens.
#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_refresh_keeps_tokens() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok1", "r1", NOW_MS + MINUTE_MS).await;

    Mock::given(method("POST"))
        .and(path("/idp/v3/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "refresh token revoked"
        })))
        .mount(&h.server)
        .await;

    let err = h.service.get_valid_access_token().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenRefresh { status: Some(400), .. }));
    assert!(err.requires_login());
    assert_eq!(stored(&h.store, StorageKey::AccessToken).await.as_deref(), Some("tok1"));
    assert_eq!(stored(&h.store, StorageKey::RefreshToken).await.as_deref(), Some("r1"));
}

/// An expiring token without a refresh token cannot be renewed.
#[tokio::test(flavor = "multi_thread")]
async fn test_expiring_token_without_refresh_token() {
    let h = harness(LaunchScript::Close).await;
    h.store
        .set_many(&[
            (StorageKey::AccessToken, "tok1".to_string()),
            (StorageKey::TokenExpiry, (NOW_MS + MINUTE_MS).to_string()),
        ])
        .await
        .unwrap();

    let err = h.service.get_valid_access_token().await.unwrap_err();
    assert_eq!(err, AuthError::NoRefreshToken);
    assert!(err.requires_login());
}

/// Logout clears all four keys and a second logout is a no-op.
#[tokio::test(flavor = "multi_thread")]
async fn test_double_logout() {
    let h = harness(LaunchScript::Close).await;
    seed_tokens(&h.store, "tok1", "r1", NOW_MS + 60 * MINUTE_MS).await;
    h.store.set(StorageKey::CodeVerifier, "leftover").await.unwrap();

    tokio_test::assert_ok!(h.service.logout().await);
    tokio_test::assert_ok!(h.service.logout().await);

    assert!(h.store.is_empty().await);
    assert_eq!(h.service.get_valid_access_token().await.unwrap_err(), AuthError::NoToken);
}

/// An abandoned attempt leaves a stale registration that the next login
/// replaces.
///
/// # Test Steps
/// 1. Start a login on a surface that stays open, then abort the task
/// 2. Verify the registration is still present
/// 3. Start a new login that receives a code
/// 4. Verify it completes and nothing is left registered
#[tokio::test(flavor = "multi_thread")]
async fn test_next_login_replaces_stale_registration() {
    let h = harness(LaunchScript::Hold).await;

    Mock::given(method("POST"))
        .and(path("/idp/v3/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": "tok1" })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let abandoned = tokio::spawn({
        let service = Arc::clone(&h.service);
        async move { service.start_authentication().await }
    });
    while h.launcher.sink().is_none() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    abandoned.abort();
    assert!(abandoned.await.unwrap_err().is_cancelled());
    assert!(h.service.has_pending_login());

    h.launcher.set_script(LaunchScript::Navigate(vec![format!("{REDIRECT_URI}?code=fresh")]));
    let session = h.service.start_authentication().await.unwrap();

    assert_eq!(session.access_token, "tok1");
    assert!(!h.service.has_pending_login());
}
