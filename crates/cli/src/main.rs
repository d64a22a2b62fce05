//! Thermowatch command-line client
//!
//! Drives the authentication core from a terminal: interactive login,
//! printing a valid access token for scripts, logout and status.

mod commands;
mod paste;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thermowatch_common::auth::InteractiveAuthLauncher;
use thermowatch_domain::{Config, ThermowatchError};
use thermowatch_infra::auth::is_loopback_redirect;
use thermowatch_infra::{build_auth_service, config, init_tracing, LoopbackBrowserLauncher};
use tracing::{debug, info};

use crate::paste::PasteRedirectLauncher;

/// Exit status when the stored session cannot produce a token
const EXIT_LOGIN_REQUIRED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "thermowatch")]
#[command(about = "Sign in to the heating IoT API and manage the stored session")]
#[command(version)]
struct Cli {
    /// Config file (TOML or JSON); defaults to environment, then probing
    #[arg(long, global = true, env = "THERMOWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured log level (`EnvFilter` syntax)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Open the authorization page and store the resulting tokens
    Login,
    /// Print a valid access token, refreshing it if needed
    Token,
    /// Remove every stored token
    Logout,
    /// Show whether a session is stored and when it expires
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before parsing so `.env` can supply THERMOWATCH_CONFIG
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli, dotenv).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            match err.downcast_ref::<ThermowatchError>() {
                Some(app_err) if app_err.requires_login() => {
                    eprintln!("hint: run `thermowatch login` to sign in again");
                    ExitCode::from(EXIT_LOGIN_REQUIRED)
                }
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: Cli, dotenv: dotenvy::Result<PathBuf>) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => config::load_from_file(Some(path.clone()))?,
        None => config::load()?,
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging);
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env loaded"),
    }
    info!(command = ?cli.command, "Thermowatch starting");

    let launcher = launcher_for(&config);
    let service = build_auth_service(&config, launcher)?;

    match cli.command {
        Command::Login => commands::login(&service).await,
        Command::Token => commands::token(&service).await,
        Command::Logout => commands::logout(&service).await,
        Command::Status => commands::status(&service, &config).await,
    }
}

/// Loopback server for `http://localhost` redirect URIs, paste-back prompt
/// for custom schemes
fn launcher_for(config: &Config) -> Arc<dyn InteractiveAuthLauncher> {
    if is_loopback_redirect(&config.auth.redirect_uri) {
        debug!("Using loopback redirect launcher");
        Arc::new(LoopbackBrowserLauncher::new())
    } else {
        debug!("Using paste-back redirect launcher");
        Arc::new(PasteRedirectLauncher::stdin())
    }
}
