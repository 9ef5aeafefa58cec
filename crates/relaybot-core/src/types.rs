//! Core types for Relaybot.
//!
//! Two families live here:
//! - relay types shared by the engine and the transports (`RelayConfig`,
//!   `InboundMessage`, `RelaySessionState`, `StatusSnapshot`, ...)
//! - the OpenAI-compatible chat completions wire format used by the
//!   generative-text providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StartError;

/// Discord-style numeric identifier (guilds, channels, users).
pub type Snowflake = u64;

/// Substituted for the message body when the source platform withholds it.
pub const PLACEHOLDER_CONTENT_UNAVAILABLE: &str =
    "[message content unavailable: the bot lacks the Message Content permission]";

// ─────────────────────────────────────────────
// Relay configuration
// ─────────────────────────────────────────────

/// Optional rewriting of forwarded content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    pub enabled: bool,
    /// System instruction handed to the generative-text service.
    pub prompt: String,
}

impl Customization {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            enabled: true,
            prompt: prompt.into(),
        }
    }

    /// Enabled with something to instruct the service with.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.prompt.trim().is_empty()
    }
}

/// Everything one relay session needs. Immutable once handed to a session.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Bot token for the source platform (Discord).
    pub source_credential: String,
    /// Bot token for the destination platform (Telegram).
    pub destination_credential: String,
    /// Destination chat id (`-100…`) or channel username (`@name`).
    pub destination_target: String,
    /// Source channel links, in configured order. Duplicates allowed.
    pub channel_links: Vec<String>,
    pub customization: Customization,
}

impl RelayConfig {
    pub fn has_destination_credential(&self) -> bool {
        !self.destination_credential.trim().is_empty()
    }

    /// Synchronous precondition check performed before any side effect.
    pub fn validate(&self) -> Result<(), StartError> {
        if self.channel_links.iter().all(|l| l.trim().is_empty()) {
            return Err(StartError::EmptyChannelList);
        }
        if self.source_credential.trim().is_empty() {
            return Err(StartError::MissingField("source credential"));
        }
        if !self.has_destination_credential() {
            return Err(StartError::MissingField("destination credential"));
        }
        if self.destination_target.trim().is_empty() {
            return Err(StartError::MissingField("destination target"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("source_credential", &redact(&self.source_credential))
            .field("destination_credential", &redact(&self.destination_credential))
            .field("destination_target", &self.destination_target)
            .field("channel_links", &self.channel_links)
            .field("customization", &self.customization)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

// ─────────────────────────────────────────────
// Control-surface identity
// ─────────────────────────────────────────────

/// The operator logged into the control surface (from the OAuth collaborator).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorIdentity {
    pub id: String,
    pub username: String,
}

/// Whether the control surface currently holds a validated login.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(OperatorIdentity),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

// ─────────────────────────────────────────────
// Source-side data
// ─────────────────────────────────────────────

/// Who the source connection is logged in as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceIdentity {
    pub user_id: Snowflake,
    pub username: String,
}

/// A community (Discord guild) visible to the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommunityInfo {
    pub id: Snowflake,
    pub name: String,
}

/// A channel as reported by the source directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: Snowflake,
    /// Owning community; `None` for DMs and other guild-less channels.
    pub community_id: Option<Snowflake>,
    pub name: String,
}

/// A channel confirmed to exist and be visible, derived from a configured link.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedChannel {
    pub community_id: Snowflake,
    pub channel_id: Snowflake,
    pub display_name: String,
}

/// A message event received from the source platform. Never persisted.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub author_id: Snowflake,
    pub author_display_name: String,
    pub channel_id: Snowflake,
    pub community_id: Option<Snowflake>,
    /// `None` when the platform withheld the body.
    pub raw_content: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        author_id: Snowflake,
        author_display_name: impl Into<String>,
        channel_id: Snowflake,
        raw_content: Option<String>,
    ) -> Self {
        InboundMessage {
            author_id,
            author_display_name: author_display_name.into(),
            channel_id,
            community_id: None,
            raw_content,
            received_at: Utc::now(),
        }
    }

    pub fn with_community(mut self, community_id: Snowflake) -> Self {
        self.community_id = Some(community_id);
        self
    }

    /// Body to relay, falling back to the degraded-permission placeholder.
    pub fn content_or_placeholder(&self) -> &str {
        self.raw_content
            .as_deref()
            .unwrap_or(PLACEHOLDER_CONTENT_UNAVAILABLE)
    }
}

// ─────────────────────────────────────────────
// Session state + status
// ─────────────────────────────────────────────

/// Why a relay session ended up in `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("authentication with the source platform failed: {0}")]
    AuthError(String),
    #[error("none of the configured channel links could be resolved")]
    NoChannelsResolved,
    #[error("lost connection to the source platform: {0}")]
    ConnectionLost(String),
    #[error("relay session aborted: {0}")]
    Aborted(String),
}

/// The process-wide relay state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum RelaySessionState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed(FailureReason),
}

impl RelaySessionState {
    /// Starting or Running; what a control surface shows as "running".
    pub fn is_running(&self) -> bool {
        matches!(self, RelaySessionState::Starting | RelaySessionState::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelaySessionState::Stopped => "stopped",
            RelaySessionState::Starting => "starting",
            RelaySessionState::Running => "running",
            RelaySessionState::Stopping => "stopping",
            RelaySessionState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for RelaySessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelaySessionState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Read-only projection returned to the control surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: RelaySessionState,
    pub resolved_channel_count: usize,
    pub has_destination_credential: bool,
    /// Messages delivered by the current (or last) session.
    pub forwarded_count: u64,
    /// Messages dropped after exhausting delivery retries.
    pub failed_delivery_count: u64,
}

impl StatusSnapshot {
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

// ─────────────────────────────────────────────
// Chat completions wire format (generative-text service)
// ─────────────────────────────────────────────

/// A chat message in the OpenAI format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Raw chat completion response. Used internally for deserialization.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub content: Option<String>,
}

/// Token usage statistics from the provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A successful completion from a provider.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
}

impl LlmResponse {
    /// Trimmed text content, if the model produced any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl ChatCompletionResponse {
    /// First choice as an `LlmResponse`; `None` when the provider sent no choices.
    pub fn into_response(self) -> Option<LlmResponse> {
        let usage = self.usage;
        self.choices.into_iter().next().map(|c| LlmResponse {
            content: c.message.content,
            finish_reason: c.finish_reason,
            usage,
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
