//! Configuration schema.
//!
//! Hierarchy: `Config` → `DiscordConfig`, `TelegramConfig`,
//! `CustomizationConfig`, `ProvidersConfig`, `RelaySection`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Customization, RelayConfig};

/// Default Discord REST API base.
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Default Discord Gateway WebSocket URL.
pub const DEFAULT_DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Default model for the customization step.
pub const DEFAULT_CUSTOMIZATION_MODEL: &str = "gemini-2.0-flash";

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.relaybot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub telegram: TelegramConfig,
    pub customization: CustomizationConfig,
    pub providers: ProvidersConfig,
    pub relay: RelaySection,
}

impl Config {
    /// Build the immutable per-session relay config.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            source_credential: self.discord.token.clone(),
            destination_credential: self.telegram.token.clone(),
            destination_target: self.telegram.chat_id.clone(),
            channel_links: self.discord.channel_links.clone(),
            customization: Customization {
                enabled: self.customization.enabled,
                prompt: self.customization.prompt.clone(),
            },
        }
    }
}

// ─────────────────────────────────────────────
// Platforms
// ─────────────────────────────────────────────

/// Source platform (Discord) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordConfig {
    /// Bot token.
    pub token: String,
    /// Channel links such as `https://discord.com/channels/<guild>/<channel>`.
    pub channel_links: Vec<String>,
    /// REST API base URL.
    pub api_base: String,
    /// Gateway WebSocket URL.
    pub gateway_url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_links: Vec::new(),
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            gateway_url: DEFAULT_DISCORD_GATEWAY_URL.to_string(),
        }
    }
}

/// Destination platform (Telegram) settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Target chat id or `@channelname`.
    pub chat_id: String,
    /// Custom Bot API server URL (self-hosted `telegram-bot-api`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

// ─────────────────────────────────────────────
// Customization
// ─────────────────────────────────────────────

/// Content rewriting through a generative-text provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomizationConfig {
    pub enabled: bool,
    /// System instruction for the rewrite.
    pub prompt: String,
    /// Model identifier, matched against the provider registry.
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for CustomizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prompt: String::new(),
            model: DEFAULT_CUSTOMIZATION_MODEL.to_string(),
            timeout_secs: 20,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single generative-text provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub openai: ProviderConfig,
    pub openrouter: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub groq: ProviderConfig,
}

impl ProvidersConfig {
    /// Get a provider config by name (e.g. `"gemini"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }

    /// Convert to a map for use with the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        self.entries()
            .into_iter()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect()
    }

    pub(crate) fn entries_mut(&mut self) -> [(&'static str, &mut ProviderConfig); 6] {
        [
            ("GEMINI", &mut self.gemini),
            ("OPENAI", &mut self.openai),
            ("OPENROUTER", &mut self.openrouter),
            ("ANTHROPIC", &mut self.anthropic),
            ("DEEPSEEK", &mut self.deepseek),
            ("GROQ", &mut self.groq),
        ]
    }

    fn entries(&self) -> [(&'static str, &ProviderConfig); 6] {
        [
            ("gemini", &self.gemini),
            ("openai", &self.openai),
            ("openrouter", &self.openrouter),
            ("anthropic", &self.anthropic),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
        ]
    }
}

// ─────────────────────────────────────────────
// Relay tuning
// ─────────────────────────────────────────────

/// Delivery retry tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySection {
    /// Attempts per forwarded message, including the first.
    pub max_attempts: u32,
    /// Fixed wait between attempts, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.discord.api_base, DEFAULT_DISCORD_API_BASE);
        assert_eq!(config.customization.model, "gemini-2.0-flash");
        assert_eq!(config.customization.timeout_secs, 20);
        assert_eq!(config.relay.max_attempts, 3);
        assert_eq!(config.relay.retry_delay_ms, 2000);
        assert!(!config.customization.enabled);
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "discord": {
                "token": "disc-token",
                "channelLinks": ["https://discord.com/channels/1/2"]
            },
            "telegram": { "token": "123:abc", "chatId": "-100987" },
            "customization": { "enabled": true, "prompt": "Translate to French", "timeoutSecs": 5 }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.discord.token, "disc-token");
        assert_eq!(config.discord.channel_links.len(), 1);
        assert_eq!(config.telegram.chat_id, "-100987");
        assert!(config.customization.enabled);
        assert_eq!(config.customization.timeout_secs, 5);
        // Defaults preserved for missing fields
        assert_eq!(config.discord.gateway_url, DEFAULT_DISCORD_GATEWAY_URL);
        assert_eq!(config.customization.model, DEFAULT_CUSTOMIZATION_MODEL);
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["discord"].get("channelLinks").is_some());
        assert!(json["telegram"].get("chatId").is_some());
        assert!(json["relay"].get("retryDelayMs").is_some());
        assert!(json["discord"].get("channel_links").is_none());
    }

    #[test]
    fn test_relay_config_projection() {
        let mut config = Config::default();
        config.discord.token = "d".into();
        config.discord.channel_links = vec!["link".into()];
        config.telegram.token = "t".into();
        config.telegram.chat_id = "@news".into();
        config.customization.enabled = true;
        config.customization.prompt = "Be brief".into();

        let relay = config.relay_config();
        assert_eq!(relay.source_credential, "d");
        assert_eq!(relay.destination_credential, "t");
        assert_eq!(relay.destination_target, "@news");
        assert_eq!(relay.channel_links, vec!["link"]);
        assert!(relay.customization.is_active());
    }

    #[test]
    fn test_providers_get_by_name() {
        let mut providers = ProvidersConfig::default();
        providers.gemini.api_key = "g-123".to_string();

        assert!(providers.get_by_name("gemini").unwrap().is_configured());
        assert!(!providers.get_by_name("openai").unwrap().is_configured());
        assert!(providers.get_by_name("nonexistent").is_none());
        assert_eq!(providers.to_map().len(), 6);
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.relay.max_attempts, 3);
        assert!(config.telegram.api_url.is_none());
    }
}
