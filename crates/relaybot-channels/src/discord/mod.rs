//! Discord source — raw Gateway WebSocket for events, REST for lookups.
//!
//! No heavy Discord library: the gateway speaks JSON over `tokio-tungstenite`
//! and the directory uses `reqwest`.
//!
//! If the bot lacks the privileged MESSAGE_CONTENT intent, Discord closes
//! the handshake with 4014. The connector then retries once without it and
//! the relay forwards a placeholder for every message body.

mod directory;
mod gateway;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use relaybot_core::config::schema::DiscordConfig;
use relaybot_core::error::SourceError;
use relaybot_core::types::{ChannelInfo, CommunityInfo, InboundMessage, Snowflake, SourceIdentity};

use crate::base::{ChannelDirectory, SourceConnection, SourceConnector};

pub use directory::DiscordDirectory;
pub use gateway::{GATEWAY_INTENTS, INTENT_MESSAGE_CONTENT};

use gateway::{GatewaySession, HandshakeError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const TASK_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ─────────────────────────────────────────────
// DiscordConnector
// ─────────────────────────────────────────────

/// Opens Discord gateway sessions.
pub struct DiscordConnector {
    gateway_url: String,
    api_base: String,
    http: reqwest::Client,
    handshake_timeout: Duration,
}

impl DiscordConnector {
    pub fn new(gateway_url: &str, api_base: &str) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            gateway_url: gateway_url.to_string(),
            api_base: api_base.to_string(),
            http,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    pub fn from_config(config: &DiscordConfig) -> Result<Self, SourceError> {
        Self::new(&config.gateway_url, &config.api_base)
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn open(&self, token: &str) -> Result<GatewaySession, SourceError> {
        let url = &self.gateway_url;
        match gateway::open(url, token, GATEWAY_INTENTS, self.handshake_timeout).await {
            Ok(session) => Ok(session),
            Err(HandshakeError::DisallowedIntents) => {
                warn!(
                    "MESSAGE_CONTENT intent is not enabled for this bot; \
                     message bodies will be replaced by a placeholder"
                );
                let intents = GATEWAY_INTENTS & !INTENT_MESSAGE_CONTENT;
                gateway::open(url, token, intents, self.handshake_timeout)
                    .await
                    .map_err(HandshakeError::into_source)
            }
            Err(HandshakeError::Source(e)) => Err(e),
        }
    }
}

#[async_trait]
impl SourceConnector for DiscordConnector {
    async fn connect(&self, credential: &str) -> Result<Box<dyn SourceConnection>, SourceError> {
        if credential.trim().is_empty() {
            return Err(SourceError::Auth("discord token is empty".into()));
        }

        info!("starting discord connection (gateway v10)");
        let session = self.open(credential).await?;

        Ok(Box::new(DiscordConnection {
            directory: DiscordDirectory::new(self.http.clone(), &self.api_base, credential),
            session,
            closed: false,
        }))
    }
}

// ─────────────────────────────────────────────
// DiscordConnection
// ─────────────────────────────────────────────

/// One live gateway session plus the REST directory for the same token.
pub struct DiscordConnection {
    directory: DiscordDirectory,
    session: GatewaySession,
    closed: bool,
}

#[async_trait]
impl ChannelDirectory for DiscordConnection {
    async fn community(&self, id: Snowflake) -> Result<Option<CommunityInfo>, SourceError> {
        self.directory.community(id).await
    }

    async fn channel(&self, id: Snowflake) -> Result<Option<ChannelInfo>, SourceError> {
        self.directory.channel(id).await
    }
}

#[async_trait]
impl SourceConnection for DiscordConnection {
    fn identity(&self) -> &SourceIdentity {
        &self.session.identity
    }

    async fn next_event(&mut self) -> Result<Option<InboundMessage>, SourceError> {
        if self.closed {
            return Ok(None);
        }
        match self.session.events.recv().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => Err(e),
            None => Err(SourceError::ConnectionLost("gateway tasks stopped".into())),
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("closing discord connection");

        let _ = self.session.shutdown.send(true);
        for handle in self.session.tasks.drain(..) {
            let abort = handle.abort_handle();
            if tokio::time::timeout(TASK_SHUTDOWN_GRACE, handle).await.is_err() {
                abort.abort();
            }
        }
        self.session.events.close();
        debug!("discord connection closed");
    }
}

impl Drop for DiscordConnection {
    fn drop(&mut self) {
        for handle in &self.session.tasks {
            handle.abort();
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
