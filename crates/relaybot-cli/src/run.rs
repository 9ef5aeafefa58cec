//! `relaybot run` — wire the transports and keep the relay alive.
//!
//! Startup sequence:
//! 1. Load config
//! 2. Build the Discord connector, Telegram sender, and optional rewriter
//! 3. Start the lifecycle manager as the local operator
//! 4. Poll status, print changes, stop on Ctrl+C or failure

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use relaybot_channels::discord::DiscordConnector;
use relaybot_channels::telegram::TelegramSender;
use relaybot_core::config::{load_config, Config};
use relaybot_core::types::{AuthState, OperatorIdentity, RelaySessionState};
use relaybot_providers::{create_provider, LlmRequestConfig, ProviderRewriter, TextRewriter};
use relaybot_relay::{LifecycleManager, RelaySettings, Transports};

use crate::helpers;

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    helpers::print_banner();

    let config = load_config(config_path.as_deref());
    let relay_config = config.relay_config();
    let transports = build_transports(&config)?;
    let manager = LifecycleManager::new(transports, RelaySettings::from_config(&config.relay));

    println!("  Links:       {}", relay_config.channel_links.len());
    println!("  Destination: {}", relay_config.destination_target);
    println!(
        "  Customize:   {}",
        if relay_config.customization.is_active() {
            config.customization.model.as_str()
        } else {
            "off"
        }
    );
    println!();
    println!("  Ctrl+C to stop");
    println!();

    manager
        .start(&local_operator(), relay_config)
        .await
        .context("failed to start relay")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
    let mut last_state: Option<RelaySessionState> = None;

    let failure = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!();
                println!("  Shutting down...");
                info!("received Ctrl+C, shutting down");
                break None;
            }
            _ = ticker.tick() => {
                let status = manager.status();
                if last_state.as_ref() != Some(&status.state) {
                    println!("  {}", helpers::status_line(&status));
                    last_state = Some(status.state.clone());
                }
                if let RelaySessionState::Failed(reason) = status.state {
                    break Some(reason);
                }
            }
        }
    };

    manager
        .stop()
        .await
        .context("relay session did not shut down cleanly")?;

    match failure {
        Some(reason) => Err(anyhow::anyhow!("relay failed: {reason}")),
        None => {
            println!("  Relay stopped. Goodbye!");
            Ok(())
        }
    }
}

/// The operator running the binary is trusted.
fn local_operator() -> AuthState {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "operator".to_string());
    AuthState::Authenticated(OperatorIdentity {
        id: "local".to_string(),
        username,
    })
}

fn build_transports(config: &Config) -> Result<Transports> {
    let source = DiscordConnector::from_config(&config.discord)
        .context("failed to set up Discord connector")?;

    let destination = match config.telegram.api_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            TelegramSender::with_api_url(url).context("invalid telegram.apiUrl")?
        }
        _ => TelegramSender::new(),
    };

    Ok(Transports {
        source: Arc::new(source),
        destination: Arc::new(destination),
        rewriter: build_rewriter(config),
    })
}

/// `None` when customization is off or no provider is configured for the model.
fn build_rewriter(config: &Config) -> Option<Arc<dyn TextRewriter>> {
    let custom = &config.customization;
    if !custom.enabled {
        return None;
    }

    match create_provider(&custom.model, &config.providers.to_map()) {
        Ok(provider) => {
            let rewriter = ProviderRewriter::new(
                Arc::new(provider),
                Duration::from_secs(custom.timeout_secs.max(1)),
            )
            .with_request_config(LlmRequestConfig {
                max_tokens: custom.max_tokens,
                temperature: custom.temperature,
            });
            info!(model = %custom.model, "customization enabled");
            Some(Arc::new(rewriter))
        }
        Err(e) => {
            warn!(error = %e, "customization enabled but unavailable, forwarding unchanged");
            None
        }
    }
}
