//! OAuth 2.0 + PKCE authentication core
//!
//! Obtains, persists and refreshes the tokens that authorize calls to the
//! heating vendor's IoT API, using the Authorization Code grant with PKCE
//! (no client secret).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AuthService   │  start_authentication / get_valid_access_token / logout
//! └────────┬────────┘
//!          │
//!          ├──► PKCE utilities          (verifier + S256 challenge)
//!          ├──► RedirectListener        (single-slot redirect wait)
//!          │         ▲
//!          │         └── RedirectSink ◄── InteractiveAuthLauncher (platform)
//!          ├──► TokenExchangeClient     (token endpoint, both grants)
//!          │
//!          └──► TokenStore              (memory / keychain / file)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use thermowatch_common::auth::{
//!     AuthError, AuthService, InteractiveAuthLauncher, MemoryTokenStore, OAuthConfig,
//! };
//!
//! # async fn example(launcher: Arc<impl InteractiveAuthLauncher>) -> Result<(), AuthError> {
//! let config = OAuthConfig::new(
//!     "https://iam.viessmann.com",
//!     "your_client_id",
//!     "http://localhost:8081",
//!     vec!["IoT User".to_string(), "offline_access".to_string()],
//! );
//! let service = AuthService::new(config, Arc::new(MemoryTokenStore::new()), launcher);
//!
//! service.start_authentication().await?;
//! let token = service.get_valid_access_token().await?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - **[`pkce`]**: verifier and challenge generation
//! - **[`types`]**: wire shapes, server configuration, session view
//! - **[`error`]**: [`AuthError`] and [`StoreError`]
//! - **[`store`]**: token store contract and in-memory store
//! - **[`redirect`]**: redirect listener state machine
//! - **[`traits`]**: launcher, browser session and clock seams
//! - **[`client`]**: token endpoint client
//! - **[`service`]**: orchestrator

pub mod error;
pub mod pkce;
pub mod types;

#[cfg(feature = "runtime")]
pub mod client;
#[cfg(feature = "platform")]
mod keychain;
#[cfg(feature = "runtime")]
pub mod redirect;
#[cfg(feature = "runtime")]
pub mod service;
#[cfg(feature = "runtime")]
pub mod store;
#[cfg(feature = "runtime")]
pub mod traits;

pub use error::{AuthError, StoreError};
pub use pkce::{base64url_encode, generate_code_challenge, generate_code_verifier, PkceChallenge};
pub use types::{AuthSession, OAuthConfig, OAuthErrorBody, TokenResponse};

#[cfg(feature = "runtime")]
pub use client::TokenExchangeClient;
#[cfg(feature = "platform")]
pub use keychain::KeychainTokenStore;
#[cfg(feature = "runtime")]
pub use redirect::{parse_redirect, PendingRedirect, RedirectListener, RedirectOutcome, RedirectSink};
#[cfg(feature = "runtime")]
pub use service::{AuthService, AuthServiceOptions};
#[cfg(feature = "runtime")]
pub use store::{MemoryTokenStore, StorageKey, TokenStore};
#[cfg(feature = "runtime")]
pub use traits::{BrowserSession, Clock, InteractiveAuthLauncher, SystemClock};
