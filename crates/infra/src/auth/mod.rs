//! Auth core wiring for the running application
//!
//! - [`loopback`]: loopback redirect server + system browser launcher
//! - [`factory`]: builds an [`thermowatch_common::auth::AuthService`] from
//!   [`thermowatch_domain::Config`]

pub mod factory;
pub mod loopback;

pub use factory::{
    build_auth_service, build_token_store, oauth_config, service_options, AppAuthService,
};
pub use loopback::{is_loopback_redirect, BrowserOpener, LoopbackBrowserLauncher};
