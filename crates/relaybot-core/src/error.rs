//! Error taxonomy for the relay engine and its transports.
//!
//! Configuration errors are rejected synchronously at `start`, resolution
//! errors are per-link, rewrite errors never leave the transformer, and
//! delivery errors are retried before surfacing as `Exhausted`.

use std::time::Duration;

use thiserror::Error;

/// Rejected `start` request. No side effects happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("control surface is not authenticated with the source platform")]
    NotAuthenticated,
    #[error("no source channel links configured")]
    EmptyChannelList,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StopError {
    #[error("relay session task did not shut down cleanly: {0}")]
    Join(String),
}

/// Why a single channel link could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("malformed channel link '{link}': {reason}")]
    Malformed { link: String, reason: String },
    #[error("community {0} is not visible to the bot")]
    CommunityNotFound(u64),
    #[error("channel {channel_id} not found in community {community_id}")]
    ChannelNotFound { community_id: u64, channel_id: u64 },
    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

impl ResolutionError {
    pub fn malformed(link: &str, reason: impl Into<String>) -> Self {
        ResolutionError::Malformed {
            link: link.to_string(),
            reason: reason.into(),
        }
    }
}

/// Source-platform transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// One failed attempt to create a destination-platform message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    #[error("invalid destination target '{0}'")]
    InvalidTarget(String),
    #[error("destination transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: DestinationError,
    },
}

/// Generative-text rewrite failure. Always recovered by the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("rewrite timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("provider returned no text")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display_includes_cause() {
        let err = DeliveryError::Exhausted {
            attempts: 3,
            last: DestinationError::Transport("HTTP 502".into()),
        };
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("HTTP 502"));
    }

    #[test]
    fn test_malformed_helper() {
        let err = ResolutionError::malformed("nope", "missing '/channels/' segment");
        assert_eq!(
            err.to_string(),
            "malformed channel link 'nope': missing '/channels/' segment"
        );
    }
}
