//! Tracing subscriber setup
//!
//! Every crate in the workspace logs through `tracing`; this module installs
//! the process-wide subscriber once configuration is known.

use thermowatch_domain::{LogFormat, LoggingSettings};
use tracing_subscriber::EnvFilter;

/// Initialize tracing from logging settings
///
/// `RUST_LOG` wins over the configured level when set. Uses `try_init`, so
/// calling this more than once (tests, embedding) is harmless. Output goes to
/// stderr so stdout stays free for command results.
pub fn init_tracing(settings: &LoggingSettings) {
    use tracing_subscriber::fmt;

    let filter = build_filter(settings);

    let result = match settings.format {
        LogFormat::Json => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init()
        }
        LogFormat::Pretty => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()
        }
    };
    drop(result);
}

fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
