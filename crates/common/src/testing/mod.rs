//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted launcher and a token store with injectable
//!   failures
//! - **[`time`]**: controllable wall clock
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use thermowatch_common::testing::{MockClock, ScriptedLauncher};
//!
//! let clock = MockClock::at_millis(0);
//! clock.advance(Duration::from_secs(60));
//! let launcher = ScriptedLauncher::redirect_to("http://localhost:8081/?code=abc123");
//! assert!(launcher.opened_urls().is_empty());
//! ```

pub mod mocks;
pub mod time;

pub use mocks::{FailingTokenStore, LaunchScript, ScriptedLauncher};
pub use time::MockClock;
