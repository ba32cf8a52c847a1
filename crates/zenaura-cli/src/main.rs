//! zenaura - command-line front end for the zenaura session manager.
//!
//! Every invocation restores the persisted session first, so `whoami` and
//! `request` run with the same token a previous `login` stored.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zenaura_core::api::{ApiClient, Method};
use zenaura_core::auth::{Navigator, SessionManager, SessionStatus, SessionStore};
use zenaura_core::{Config, UserProfile};

#[derive(Parser)]
#[command(name = "zenaura", version, about = "Manage your zenaura login session")]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// API base URL (overrides config and ZENAURA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show whether a session is active
    Status,
    /// Store a token and resolve the user it belongs to
    Login {
        /// Session token; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
        /// Known user profile as JSON, skips the profile lookup
        #[arg(long)]
        user_json: Option<String>,
    },
    /// Revoke the token and clear the local session
    Logout,
    /// Print the current user's profile
    Whoami,
    /// Send an authenticated request and print the response body
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

/// Logout in a terminal: nowhere to redirect, so tell the user what to do next
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect_to_login(&self) {
        eprintln!("Session ended. Run `zenaura login` to sign in again.");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = %config.api_base_url, storage = ?config.storage, "zenaura starting");

    let api = config.api_client()?;
    let store = SessionStore::new(config.token_storage()?, api.clone());
    let manager = SessionManager::new(store, Arc::new(TerminalNavigator));
    manager.reconcile().await;

    let result = run(&manager, &api, cli.command).await;
    manager.teardown();
    result
}

async fn run(manager: &SessionManager, api: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            match manager.status() {
                SessionStatus::Authenticated => {
                    let name = manager.user().map(|u| u.display_name()).unwrap_or_default();
                    println!("Logged in as {}", name);
                }
                SessionStatus::Unverified => {
                    println!("Token stored, but the profile could not be loaded");
                }
                SessionStatus::Unauthenticated | SessionStatus::Initializing => {
                    println!("Not logged in");
                }
            }
            Ok(())
        }
        Command::Login { token, user_json } => {
            let token = match token {
                Some(t) => t,
                None => rpassword::prompt_password("Token: ").context("Failed to read token")?,
            };
            let token = token.trim();
            if token.is_empty() {
                bail!("No token provided");
            }

            let initial_user = user_json
                .map(|json| serde_json::from_str::<UserProfile>(&json))
                .transpose()
                .context("Failed to parse --user-json")?;

            match manager.login(token, initial_user).await {
                Some(user) => println!("Logged in as {}", user.display_name()),
                None if manager.token().is_some() => {
                    println!("Token saved, but the profile lookup failed; try `zenaura whoami` later");
                }
                None => bail!("Login failed: the token was rejected"),
            }
            Ok(())
        }
        Command::Logout => {
            manager.logout().await;
            Ok(())
        }
        Command::Whoami => {
            let Some(user) = manager.user() else {
                bail!("Not logged in");
            };
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        Command::Request { method, path, body } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let body = body
                .map(|b| serde_json::from_str::<serde_json::Value>(&b))
                .transpose()
                .context("Failed to parse --body as JSON")?;

            let response = api.request(method, &path, body.as_ref()).await?;
            println!("{}", response.body);
            Ok(())
        }
    }
}
