//! Authentication core shared across Thermowatch crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: PKCE helpers and plain data types
//! - `runtime`: async auth core (token store contract, redirect listener,
//!   token exchange client, orchestrator)
//! - `platform`: platform keychain integration
//! - `test-utils`: scripted launchers, failing stores and a mock clock

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation + runtime tiers
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(all(feature = "runtime", any(feature = "test-utils", test)))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{AuthError, AuthService, TokenStore};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider};
