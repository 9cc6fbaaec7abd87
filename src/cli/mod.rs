//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run the bot with the console front end
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

pub mod console;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::bot::PollBot;
use crate::config::{self, Config};
use crate::dialog::ChatUser;
use crate::display::{ConsoleDisplay, DynDisplay, TelegramDisplay};
use crate::polls::{MemoryStore, VoterProfile};
use console::Console;

/// Tallybot: build polls in a chat dialog and keep their results live.
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = env!("CARGO_PKG_VERSION"),
    about = "Tallybot — chat poll builder with live-updating results"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bot (default when no subcommand is given).
    Start {
        /// User id the console starts as.
        #[arg(long, default_value_t = 1)]
        user: i64,

        /// Username shown when the console user votes.
        #[arg(long)]
        username: Option<String>,
    },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

/// Keys whose values are never printed.
const SECRET_KEYS: &[&str] = &["token", "secret", "password"];

/// Run the `start` subcommand.
pub async fn handle_start(
    config: Config,
    user: i64,
    username: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let display: DynDisplay = match config.telegram_display() {
        Some(telegram) => {
            info!(api_base = %telegram.api_base, "publishing polls to Telegram");
            Arc::new(TelegramDisplay::new(telegram)?)
        }
        None => Arc::new(ConsoleDisplay::new()),
    };

    let bot = Arc::new(PollBot::new(Arc::new(MemoryStore::new()), display));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = vec![bot.spawn_refresh_worker(shutdown_rx.clone())];
    if let Some((ttl, every)) = config.sessions.sweep() {
        workers.push(bot.spawn_session_sweeper(ttl, every, shutdown_rx));
    }

    let profile = username
        .map(VoterProfile::with_username)
        .unwrap_or_default();
    let mut console = Console::new(bot.clone(), ChatUser::new(user).with_profile(profile));
    println!("Tallybot is running. Type /help for commands.\n");

    tokio::select! {
        result = console.run(BufReader::new(tokio::io::stdin())) => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    let _ = shutdown_tx.send(true);
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "worker task failed");
        }
    }
    info!("tallybot stopped");
    Ok(())
}

/// Run the `config show` subcommand.
pub fn handle_config_show(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let redacted = redact_secrets(serde_json::to_value(config)?);
    println!("{}", serde_json::to_string_pretty(&redacted)?);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path() {
    println!("{}", config::config_path().display());
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("tally {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("TALLYBOT_BUILD_DATE"));
    println!("  Git commit: {}", env!("TALLYBOT_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

/// Redact known secret keys in a JSON value (recursive).
fn redact_secrets(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let lower = key.to_lowercase();
                if SECRET_KEYS.iter().any(|s| lower.contains(s)) {
                    *child = Value::String("[REDACTED]".to_string());
                } else {
                    *child = redact_secrets(child.take());
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                *item = redact_secrets(item.take());
            }
        }
        _ => {}
    }
    value
}
