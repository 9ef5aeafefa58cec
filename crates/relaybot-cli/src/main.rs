//! Relaybot CLI — entry point.
//!
//! # Commands
//!
//! - `relaybot run [--logs] [--json] [--config PATH]` — relay until Ctrl+C
//! - `relaybot status` — show configuration and link status
//! - `relaybot check-links LINK...` — validate channel links offline
//! - `relaybot onboard` — write a default config file

mod helpers;
mod links;
mod onboard;
mod run;
mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Relaybot — forward Discord channels to a Telegram chat
#[derive(Parser)]
#[command(name = "relaybot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start relaying and keep running until Ctrl+C
    Run {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,

        /// Emit logs as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Config file (defaults to ~/.relaybot/config.json)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show configuration and link status
    Status {
        /// Config file (defaults to ~/.relaybot/config.json)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Parse channel links without contacting Discord
    CheckLinks {
        /// Links such as https://discord.com/channels/<guild>/<channel>
        #[arg(required = true)]
        links: Vec<String>,
    },

    /// Write a default configuration file
    Onboard {
        /// Config file (defaults to ~/.relaybot/config.json)
        #[arg(short, long)]
        config: Option<String>,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { logs, json, config } => {
            init_logging(logs, json);
            run::run(config_path(config)).await
        }
        Commands::Status { config } => status::run(config_path(config)),
        Commands::CheckLinks { links } => links::run(&links),
        Commands::Onboard { config } => onboard::run(config_path(config)),
    }
}

fn config_path(arg: Option<String>) -> Option<PathBuf> {
    arg.map(|p| helpers::expand_tilde(&p))
}

/// Initialize tracing/logging. `RUST_LOG` wins over the flags.
fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "relaybot=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
