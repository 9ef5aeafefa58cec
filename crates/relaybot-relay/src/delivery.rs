//! Destination delivery with bounded, fixed-delay retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use relaybot_channels::DestinationSender;
use relaybot_core::config::schema::RelaySection;
use relaybot_core::error::{DeliveryError, DestinationError};

pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;
pub const DELIVERY_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Retry policy for outbound sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaySettings {
    pub max_attempts: u32,
    /// Fixed wait between attempts (not exponential).
    pub retry_delay: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            retry_delay: DELIVERY_RETRY_DELAY,
        }
    }
}

impl RelaySettings {
    pub fn from_config(section: &RelaySection) -> Self {
        Self {
            max_attempts: section.max_attempts.max(1),
            retry_delay: Duration::from_millis(section.retry_delay_ms),
        }
    }
}

/// Sends one transformed message, retrying transport failures.
#[derive(Clone)]
pub struct DeliveryWorker {
    sender: Arc<dyn DestinationSender>,
    settings: RelaySettings,
}

impl DeliveryWorker {
    pub fn new(sender: Arc<dyn DestinationSender>, settings: RelaySettings) -> Self {
        Self { sender, settings }
    }

    pub async fn deliver(
        &self,
        text: &str,
        target: &str,
        credential: &str,
    ) -> Result<(), DeliveryError> {
        let max = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.sender.send_text(credential, target, text).await {
                Ok(()) => {
                    debug!(attempt, target = %target, "Delivered");
                    return Ok(());
                }
                // Retrying cannot fix a bad address.
                Err(e @ DestinationError::InvalidTarget(_)) => {
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) if attempt >= max => {
                    return Err(DeliveryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = max,
                        error = %e,
                        "Delivery attempt failed, retrying in {:?}",
                        self.settings.retry_delay
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
            }
        }
    }
}
