//! Capability traits — the interfaces the relay engine talks to.
//!
//! - `SourceConnector::connect()` — authenticate and open a live source connection
//! - `SourceConnection::next_event()` — pull the next inbound message
//! - `ChannelDirectory` — community/channel lookups used to resolve links
//! - `DestinationSender::send_text()` — create one message on the destination
//!
//! Real implementations live in `discord` and `telegram`; tests use fakes.

use async_trait::async_trait;

use relaybot_core::error::{DestinationError, SourceError};
use relaybot_core::types::{ChannelInfo, CommunityInfo, InboundMessage, Snowflake, SourceIdentity};

/// Community and channel lookups against the live source platform.
///
/// `Ok(None)` means "not visible to this credential".
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn community(&self, id: Snowflake) -> Result<Option<CommunityInfo>, SourceError>;

    async fn channel(&self, id: Snowflake) -> Result<Option<ChannelInfo>, SourceError>;
}

/// An authenticated, live connection to the source platform.
#[async_trait]
pub trait SourceConnection: ChannelDirectory {
    /// The bot account this connection is logged in as.
    fn identity(&self) -> &SourceIdentity;

    /// Wait for the next inbound message.
    ///
    /// Returns `Ok(None)` once the connection has been closed locally.
    /// Must be cancel-safe: the session races it against its stop signal.
    async fn next_event(&mut self) -> Result<Option<InboundMessage>, SourceError>;

    /// Release the connection. Idempotent.
    async fn close(&mut self);
}

/// Opens source connections from a bot credential.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Authenticate and connect. Credential rejection is `SourceError::Auth`.
    async fn connect(&self, credential: &str) -> Result<Box<dyn SourceConnection>, SourceError>;
}

/// Creates messages on the destination platform.
#[async_trait]
pub trait DestinationSender: Send + Sync {
    /// Create exactly one message with `text` in `target`. One attempt, no retry.
    async fn send_text(
        &self,
        credential: &str,
        target: &str,
        text: &str,
    ) -> Result<(), DestinationError>;
}
