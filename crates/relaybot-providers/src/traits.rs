//! LLM Provider trait — the abstraction over generative-text backends.
//!
//! The `HttpProvider` in `http_provider.rs` covers every OpenAI-compatible API.

use async_trait::async_trait;
use relaybot_core::types::{LlmResponse, Message};

use crate::error::ProviderError;

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` — Conversation in OpenAI format (system + user turns).
    /// * `model`    — Model identifier (e.g. `"gemini-2.0-flash"`, `"gpt-4o-mini"`).
    /// * `config`   — Temperature, max_tokens, etc.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
