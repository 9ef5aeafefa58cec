//! `relaybot status` — show configuration, credentials, and link status.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use relaybot_core::config::{get_config_path, load_config};
use relaybot_core::utils::mask_secret;
use relaybot_providers::registry::{match_provider, PROVIDERS};

use crate::helpers::mark;
use crate::links::print_links;

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref());
    let path = config_path.unwrap_or_else(get_config_path);

    println!();
    println!("{}", "📡 Relaybot Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );

    // Credentials
    println!("  {:<18} {}", "Discord token:".bold(), secret_status(&config.discord.token));
    println!("  {:<18} {}", "Telegram token:".bold(), secret_status(&config.telegram.token));
    let chat = if config.telegram.chat_id.is_empty() {
        "· not configured".dimmed().to_string()
    } else {
        config.telegram.chat_id.clone()
    };
    println!("  {:<18} {}", "Telegram chat:".bold(), chat);
    if let Some(url) = &config.telegram.api_url {
        println!("  {:<18} {}", "Bot API server:".bold(), url);
    }

    // Links
    println!();
    println!("  {}", "Channel links:".bold());
    if config.discord.channel_links.is_empty() {
        println!("    {}", "· none configured".dimmed());
    } else {
        print_links(&config.discord.channel_links);
    }

    // Customization
    println!();
    let custom = &config.customization;
    let custom_status = if !custom.enabled {
        "off".dimmed().to_string()
    } else if custom.prompt.trim().is_empty() {
        format!("{} (no prompt, forwarding unchanged)", "on".yellow())
    } else {
        let providers = config.providers.to_map();
        match match_provider(&custom.model, &providers) {
            Some((_, spec)) => format!("{} {} via {}", mark(true), custom.model, spec.display_name),
            None => format!("{} {} (no provider key set)", mark(false), custom.model),
        }
    };
    println!("  {:<18} {}", "Customization:".bold(), custom_status);

    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        let status = match config.providers.get_by_name(spec.name) {
            Some(p) if p.is_configured() => format!("{} (key set)", "✓".green()),
            _ => "· not configured".dimmed().to_string(),
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    println!();
    println!(
        "  {:<18} {}",
        "Delivery:".bold(),
        format!(
            "{} attempts, {} ms apart",
            config.relay.max_attempts, config.relay.retry_delay_ms
        )
        .dimmed()
    );
    println!();

    Ok(())
}

fn secret_status(secret: &str) -> String {
    if secret.is_empty() {
        "· not configured".dimmed().to_string()
    } else {
        format!("{} {}", "✓".green(), mask_secret(secret).dimmed())
    }
}
