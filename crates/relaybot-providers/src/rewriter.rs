//! Content rewriting capability used by the relay's transformer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relaybot_core::error::RewriteError;
use relaybot_core::types::Message;
use tracing::debug;

use crate::traits::{LlmProvider, LlmRequestConfig};

/// Rewrites one piece of user content under a system instruction.
#[async_trait]
pub trait TextRewriter: Send + Sync {
    async fn rewrite(&self, system_prompt: &str, user_content: &str)
        -> Result<String, RewriteError>;
}

/// `TextRewriter` backed by an [`LlmProvider`], with a per-call deadline.
pub struct ProviderRewriter {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request: LlmRequestConfig,
    timeout: Duration,
}

impl ProviderRewriter {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            request: LlmRequestConfig::default(),
            timeout,
        }
    }

    pub fn with_request_config(mut self, request: LlmRequestConfig) -> Self {
        self.request = request;
        self
    }
}

#[async_trait]
impl TextRewriter for ProviderRewriter {
    async fn rewrite(
        &self,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, RewriteError> {
        let messages = [Message::system(system_prompt), Message::user(user_content)];

        let call = self.provider.chat(&messages, &self.model, &self.request);
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| RewriteError::Timeout(self.timeout))?
            .map_err(|e| RewriteError::Provider(e.to_string()))?;

        let text = response.text().ok_or(RewriteError::EmptyResponse)?;
        debug!(
            provider = self.provider.display_name(),
            chars = text.chars().count(),
            "Rewrite complete"
        );
        Ok(text.to_string())
    }
}
