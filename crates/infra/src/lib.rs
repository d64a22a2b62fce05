//! # Thermowatch Infrastructure
//!
//! Platform adapters and wiring around the authentication core.
//!
//! This crate contains:
//! - Configuration loading (environment, TOML/JSON files)
//! - Tracing subscriber setup
//! - The JSON file token store
//! - The loopback redirect server + system browser launcher
//! - Conversions from auth errors into the domain error
//!
//! ## Architecture
//! - Implements the seams defined in `thermowatch-common::auth`
//! - Depends on `thermowatch-common` and `thermowatch-domain`
//! - Contains all "impure" code (filesystem, sockets, browser)

pub mod auth;
pub mod config;
pub mod errors;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use auth::{build_auth_service, AppAuthService, LoopbackBrowserLauncher};
pub use errors::InfraError;
pub use observability::init_tracing;
pub use storage::FileTokenStore;
