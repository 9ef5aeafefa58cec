//! Relay session — one live source connection, filtered and forwarded.
//!
//! A session walks `Connecting → Ready → (Processing → Ready)* → Closing →
//! Closed`. Events are handled one at a time in arrival order; the stop
//! signal is only observed between events, so an in-flight message
//! (retries included) always finishes first.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, trace, warn};

use relaybot_channels::{SourceConnection, SourceConnector};
use relaybot_core::error::SourceError;
use relaybot_core::types::{FailureReason, InboundMessage, RelayConfig};

use crate::delivery::DeliveryWorker;
use crate::lifecycle::StatusReporter;
use crate::resolver::resolve_all;
use crate::transformer::MessageTransformer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Ready,
    Processing,
    Closing,
    Closed,
}

pub(crate) struct RelaySession {
    pub config: RelayConfig,
    pub source: Arc<dyn SourceConnector>,
    pub transformer: MessageTransformer,
    pub delivery: DeliveryWorker,
    pub reporter: StatusReporter,
    pub shutdown: Arc<Notify>,
    /// Flips to `true` once the previous session has fully closed.
    pub predecessor: Option<watch::Receiver<bool>>,
    /// Flipped to `true` by this session once closed.
    pub done: watch::Sender<bool>,
    pub phase: SessionPhase,
}

impl RelaySession {
    /// Run to completion. A panic is recorded as `Failed(Aborted)` and then
    /// re-raised so the join handle reports it.
    pub(crate) async fn supervise(self) {
        let reporter = self.reporter.clone();
        if let Err(panic) = AssertUnwindSafe(self.run()).catch_unwind().await {
            let detail = panic_message(panic.as_ref());
            error!(generation = reporter.generation(), panic = %detail, "Relay session panicked");
            reporter.failed(FailureReason::Aborted(detail));
            std::panic::resume_unwind(panic);
        }
    }

    async fn run(mut self) {
        match self.drive().await {
            Ok(()) => info!(generation = self.reporter.generation(), "Relay session closed"),
            Err(reason) => {
                error!(generation = self.reporter.generation(), error = %reason, "Relay session failed");
                self.reporter.failed(reason);
            }
        }
        self.enter(SessionPhase::Closed);
        self.done.send_replace(true);
    }

    async fn drive(&mut self) -> Result<(), FailureReason> {
        if let Some(mut previous) = self.predecessor.take() {
            debug!("Waiting for previous session to close");
            let closed = async move {
                // Err means the predecessor is gone, which is as good as closed.
                let _ = previous.wait_for(|closed| *closed).await;
            };
            if until_shutdown(&self.shutdown, closed).await.is_none() {
                return Ok(());
            }
        }

        self.enter(SessionPhase::Connecting);
        let connected = until_shutdown(
            &self.shutdown,
            self.source.connect(&self.config.source_credential),
        )
        .await;
        let mut connection = match connected {
            None => return Ok(()),
            Some(Ok(connection)) => connection,
            Some(Err(e)) => return Err(connect_failure(e)),
        };
        info!(
            bot = %connection.identity().username,
            bot_id = connection.identity().user_id,
            "Connected to source"
        );

        let result = self.relay(connection.as_mut()).await;

        self.enter(SessionPhase::Closing);
        connection.close().await;
        result
    }

    async fn relay(&mut self, connection: &mut dyn SourceConnection) -> Result<(), FailureReason> {
        let resolving = resolve_all(&self.config.channel_links, &*connection);
        let Some(channels) = until_shutdown(&self.shutdown, resolving).await else {
            return Ok(());
        };
        if channels.is_empty() {
            return Err(FailureReason::NoChannelsResolved);
        }

        for channel in &channels.channels {
            info!(channel = %channel.display_name, "Listening");
        }
        self.reporter.running(channels.len());
        self.enter(SessionPhase::Ready);

        let own_id = connection.identity().user_id;
        loop {
            let event = match until_shutdown(&self.shutdown, connection.next_event()).await {
                None => return Ok(()),
                Some(Ok(Some(event))) => event,
                Some(Ok(None)) => {
                    return Err(FailureReason::ConnectionLost(
                        "source connection closed".into(),
                    ))
                }
                Some(Err(e)) => return Err(failure_from(e)),
            };

            if event.author_id == own_id {
                trace!(channel = event.channel_id, "Skipping own message");
                continue;
            }
            if !channels.contains(event.channel_id) {
                trace!(channel = event.channel_id, "Skipping message from unrelayed channel");
                continue;
            }

            self.enter(SessionPhase::Processing);
            self.process(&event).await;
            self.enter(SessionPhase::Ready);
        }
    }

    async fn process(&self, event: &InboundMessage) {
        if event.raw_content.is_none() {
            warn!(channel = event.channel_id, "Message content withheld by source, relaying placeholder");
        }

        let text = self
            .transformer
            .transform(
                event.content_or_placeholder(),
                &event.author_display_name,
                &self.config.customization,
            )
            .await;

        match self
            .delivery
            .deliver(
                &text,
                &self.config.destination_target,
                &self.config.destination_credential,
            )
            .await
        {
            Ok(()) => {
                debug!(channel = event.channel_id, author = %event.author_display_name, "Forwarded");
                self.reporter.forwarded();
            }
            Err(e) => {
                error!(channel = event.channel_id, error = %e, "Dropping message");
                self.reporter.delivery_failed();
            }
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        trace!(from = ?self.phase, to = ?phase, "Session phase");
        self.phase = phase;
    }
}

/// Race `fut` against the stop signal. `None` means stop won.
async fn until_shutdown<F: Future>(shutdown: &Notify, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.notified() => None,
        out = fut => Some(out),
    }
}

/// Any error before `Ready` is terminal as an authentication failure.
fn connect_failure(error: SourceError) -> FailureReason {
    match error {
        SourceError::Auth(detail) => FailureReason::AuthError(detail),
        other => FailureReason::AuthError(other.to_string()),
    }
}

fn failure_from(error: SourceError) -> FailureReason {
    match error {
        SourceError::Auth(detail) => FailureReason::AuthError(detail),
        other => FailureReason::ConnectionLost(other.to_string()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
