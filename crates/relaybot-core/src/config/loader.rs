//! Config loader — reads `~/.relaybot/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.relaybot/config.json`
//! 3. Environment variables `RELAYBOT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to deserialize config: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Single-link configs stored `discord.channelUrl`; it becomes the first
/// entry of `discord.channelLinks` unless that list is already present.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(discord) = raw.get_mut("discord").and_then(|d| d.as_object_mut()) else {
        return;
    };
    let Some(url) = discord.remove("channelUrl") else {
        return;
    };
    if discord.contains_key("channelLinks") {
        debug!("Ignoring legacy discord.channelUrl, channelLinks already set");
        return;
    }
    if let Some(url) = url.as_str().filter(|u| !u.is_empty()) {
        discord.insert("channelLinks".into(), serde_json::json!([url]));
        debug!("Migrated discord.channelUrl → discord.channelLinks");
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `RELAYBOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `RELAYBOT_DISCORD__TOKEN`, `RELAYBOT_DISCORD__CHANNEL_LINKS` (comma-separated)
/// - `RELAYBOT_TELEGRAM__TOKEN`, `RELAYBOT_TELEGRAM__CHAT_ID`
/// - `RELAYBOT_CUSTOMIZATION__ENABLED`, `RELAYBOT_CUSTOMIZATION__PROMPT`,
///   `RELAYBOT_CUSTOMIZATION__MODEL`
/// - `RELAYBOT_PROVIDERS__<NAME>__API_KEY`, `RELAYBOT_PROVIDERS__<NAME>__API_BASE`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("RELAYBOT_DISCORD__TOKEN") {
        config.discord.token = val;
    }
    if let Ok(val) = std::env::var("RELAYBOT_DISCORD__CHANNEL_LINKS") {
        config.discord.channel_links = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    if let Ok(val) = std::env::var("RELAYBOT_TELEGRAM__TOKEN") {
        config.telegram.token = val;
    }
    if let Ok(val) = std::env::var("RELAYBOT_TELEGRAM__CHAT_ID") {
        config.telegram.chat_id = val;
    }

    if let Ok(val) = std::env::var("RELAYBOT_CUSTOMIZATION__ENABLED") {
        config.customization.enabled = val == "true" || val == "1";
    }
    if let Ok(val) = std::env::var("RELAYBOT_CUSTOMIZATION__PROMPT") {
        config.customization.prompt = val;
    }
    if let Ok(val) = std::env::var("RELAYBOT_CUSTOMIZATION__MODEL") {
        config.customization.model = val;
    }

    for (name, provider) in config.providers.entries_mut() {
        if let Ok(val) = std::env::var(format!("RELAYBOT_PROVIDERS__{name}__API_KEY")) {
            provider.api_key = val;
        }
        if let Ok(val) = std::env::var(format!("RELAYBOT_PROVIDERS__{name}__API_BASE")) {
            provider.api_base = Some(val);
        }
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
