//! # Thermowatch Domain
//!
//! Domain types shared by every Thermowatch crate.
//!
//! This crate contains:
//! - The application error type and `Result` alias
//! - Configuration structures (auth, storage, logging)
//! - Domain constants (endpoints, storage keys, timeouts)
//!
//! ## Architecture
//! - No dependencies on other Thermowatch crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
