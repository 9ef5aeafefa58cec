//! Provider registry — static specs for the supported generative-text providers.
//!
//! Each `ProviderSpec` describes how to reach one provider: keywords for
//! model matching, the env var users usually keep the key in, and the
//! OpenAI-compatible API base.

use std::collections::HashMap;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one provider
// ─────────────────────────────────────────────

/// Static specification describing one provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name, matching the config key (e.g. `"gemini"`).
    pub name: &'static str,
    /// Keywords to match in model names (lowercase).
    pub keywords: &'static [&'static str],
    /// Env var hint shown when the provider is not configured.
    pub env_key: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Whether this is a gateway/aggregator. Gateways are the fallback
    /// when no direct match is configured.
    pub is_gateway: bool,
    /// If the API key starts with this prefix, auto-detect this provider.
    pub detect_by_key_prefix: Option<&'static str>,
    /// OpenAI-compatible API base URL.
    pub default_api_base: &'static str,
    /// Strip a routing prefix such as `gemini/` before calling the API.
    /// Gateways keep it because they route on it.
    pub strip_model_prefix: bool,
}

// ─────────────────────────────────────────────
// Providers, in matching priority order
// ─────────────────────────────────────────────

/// Complete list of supported provider specifications, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    // OpenRouter — gateway, matched by key prefix "sk-or-"
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        env_key: "RELAYBOT_PROVIDERS__OPENROUTER__API_KEY",
        display_name: "OpenRouter",
        is_gateway: true,
        detect_by_key_prefix: Some("sk-or-"),
        default_api_base: "https://openrouter.ai/api/v1",
        strip_model_prefix: false,
    },
    // Gemini, through Google's OpenAI-compatible endpoint
    ProviderSpec {
        name: "gemini",
        keywords: &["gemini", "gemma"],
        env_key: "RELAYBOT_PROVIDERS__GEMINI__API_KEY",
        display_name: "Gemini",
        is_gateway: false,
        detect_by_key_prefix: Some("AIza"),
        default_api_base: "https://generativelanguage.googleapis.com/v1beta/openai",
        strip_model_prefix: true,
    },
    ProviderSpec {
        name: "anthropic",
        keywords: &["anthropic", "claude"],
        env_key: "RELAYBOT_PROVIDERS__ANTHROPIC__API_KEY",
        display_name: "Anthropic",
        is_gateway: false,
        detect_by_key_prefix: Some("sk-ant-"),
        default_api_base: "https://api.anthropic.com/v1",
        strip_model_prefix: true,
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        env_key: "RELAYBOT_PROVIDERS__OPENAI__API_KEY",
        display_name: "OpenAI",
        is_gateway: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.openai.com/v1",
        strip_model_prefix: true,
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        env_key: "RELAYBOT_PROVIDERS__DEEPSEEK__API_KEY",
        display_name: "DeepSeek",
        is_gateway: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.deepseek.com/v1",
        strip_model_prefix: true,
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq", "llama"],
        env_key: "RELAYBOT_PROVIDERS__GROQ__API_KEY",
        display_name: "Groq",
        is_gateway: false,
        detect_by_key_prefix: Some("gsk_"),
        default_api_base: "https://api.groq.com/openai/v1",
        strip_model_prefix: true,
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Skips gateways — those are fallback only.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Detect a provider from the shape of its API key.
pub fn find_by_key_prefix(api_key: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| {
        s.detect_by_key_prefix
            .is_some_and(|pfx| api_key.starts_with(pfx))
    })
}

/// Resolve the model name sent on the wire.
///
/// Direct providers don't understand routing prefixes, so
/// `"gemini/gemini-2.0-flash"` becomes `"gemini-2.0-flash"`.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    if spec.strip_model_prefix {
        if let Some(pos) = model.rfind('/') {
            return model[pos + 1..].to_string();
        }
    }
    model.to_string()
}

/// Re-export the provider config from core — single source of truth.
pub use relaybot_core::config::schema::ProviderConfig;

/// Match a model name to a configured provider.
///
/// 1. Find by keyword match, only if that provider has an API key.
/// 2. Fallback to the first configured gateway.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name) {
            if config.is_configured() {
                return Some((config, spec));
            }
        }
    }

    PROVIDERS
        .iter()
        .filter(|s| s.is_gateway)
        .find_map(|spec| {
            providers
                .get(spec.name)
                .filter(|c| c.is_configured())
                .map(|c| (c, spec))
        })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
