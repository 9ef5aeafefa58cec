//! Telegram destination — Bot API `sendMessage` via `teloxide`.
//!
//! One forwarded event maps to exactly one `sendMessage` call, so text
//! longer than Telegram's limit is clamped rather than split.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::debug;

use relaybot_core::error::DestinationError;
use relaybot_core::utils::truncate_string;

use crate::base::DestinationSender;

/// Telegram message length limit.
pub const TELEGRAM_MAX_LEN: usize = 4096;

/// Sends plain-text messages through the Telegram Bot API.
#[derive(Clone, Debug, Default)]
pub struct TelegramSender {
    /// Custom Bot API server (self-hosted `telegram-bot-api`).
    api_url: Option<url::Url>,
}

impl TelegramSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the sender at a custom Bot API server.
    pub fn with_api_url(api_url: &str) -> Result<Self, DestinationError> {
        let url = url::Url::parse(api_url)
            .map_err(|e| DestinationError::Transport(format!("invalid Bot API url: {e}")))?;
        Ok(Self { api_url: Some(url) })
    }

    fn bot(&self, credential: &str) -> Bot {
        let bot = Bot::new(credential);
        match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        }
    }
}

/// Parse a destination address: a numeric chat id or an `@channel` username.
pub fn parse_target(target: &str) -> Result<Recipient, DestinationError> {
    let target = target.trim();
    if let Ok(id) = target.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    if target.len() > 1 && target.starts_with('@') && !target.contains(char::is_whitespace) {
        return Ok(Recipient::ChannelUsername(target.to_string()));
    }
    Err(DestinationError::InvalidTarget(target.to_string()))
}

#[async_trait]
impl DestinationSender for TelegramSender {
    async fn send_text(
        &self,
        credential: &str,
        target: &str,
        text: &str,
    ) -> Result<(), DestinationError> {
        let recipient = parse_target(target)?;
        let text = truncate_string(text, TELEGRAM_MAX_LEN);

        self.bot(credential)
            .send_message(recipient, text)
            .await
            .map_err(|e| DestinationError::Transport(e.to_string()))?;

        debug!(target = %target, "telegram message sent");
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
