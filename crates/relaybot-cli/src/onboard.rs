//! `relaybot onboard` — write a default configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use relaybot_core::config::{get_config_path, save_config, Config};

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    println!();
    println!("{}", "📡 Relaybot — Setup".cyan().bold());
    println!();

    let path = config_path.unwrap_or_else(get_config_path);
    if write_default_config(&path)? {
        println!("  {} created config at {}", "✓".green(), path.display());
    } else {
        println!("  {} config already exists at {}", "✓".green(), path.display());
    }

    println!();
    println!("  Next steps:");
    println!("    1. Set {} (Discord bot token)", "discord.token".bold());
    println!(
        "    2. Add {} such as https://discord.com/channels/<guild>/<channel>",
        "discord.channelLinks".bold()
    );
    println!(
        "    3. Set {} and {}",
        "telegram.token".bold(),
        "telegram.chatId".bold()
    );
    println!(
        "    4. Optional: enable {} and set a provider key",
        "customization".bold()
    );
    println!();
    println!(
        "  {}",
        "Any field can also come from RELAYBOT_<SECTION>__<FIELD> env vars.".dimmed()
    );
    println!(
        "{}",
        "  Setup complete! Run `relaybot run` to start relaying.".green()
    );
    println!();

    Ok(())
}

/// Write `Config::default()` unless a file already exists. Returns whether it wrote.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    Ok(true)
}
