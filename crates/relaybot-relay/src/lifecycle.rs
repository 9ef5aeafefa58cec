//! Lifecycle manager — start/stop/status for the single relay session.
//!
//! One `std::sync::Mutex<Slot>` holds the active session, a generation
//! counter, and the last published snapshot. Every `start` bumps the
//! generation; a session may only publish while its generation is current,
//! so a superseded session winds down without touching the status.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use relaybot_channels::{DestinationSender, SourceConnector};
use relaybot_core::error::{StartError, StopError};
use relaybot_core::types::{
    AuthState, FailureReason, RelayConfig, RelaySessionState, StatusSnapshot,
};
use relaybot_providers::TextRewriter;

use crate::delivery::{DeliveryWorker, RelaySettings};
use crate::session::{RelaySession, SessionPhase};
use crate::transformer::MessageTransformer;

// ─────────────────────────────────────────────
// Slot
// ─────────────────────────────────────────────

struct ActiveSession {
    generation: u64,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
    done: watch::Receiver<bool>,
}

#[derive(Default)]
pub(crate) struct Slot {
    generation: u64,
    snapshot: StatusSnapshot,
    active: Option<ActiveSession>,
    /// Superseded sessions, awaited by the next `stop`.
    retiring: Vec<JoinHandle<()>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // No update spans a panic point, so a poisoned slot is still coherent.
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Generation-gated write access to the shared snapshot.
#[derive(Clone)]
pub(crate) struct StatusReporter {
    slot: Arc<Mutex<Slot>>,
    generation: u64,
}

impl StatusReporter {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn update(&self, apply: impl FnOnce(&mut StatusSnapshot)) {
        let mut slot = lock(&self.slot);
        if slot.generation == self.generation {
            apply(&mut slot.snapshot);
        }
    }

    pub(crate) fn running(&self, resolved_channels: usize) {
        self.update(|snapshot| {
            if snapshot.state == RelaySessionState::Starting {
                snapshot.state = RelaySessionState::Running;
                snapshot.resolved_channel_count = resolved_channels;
            }
        });
    }

    pub(crate) fn failed(&self, reason: FailureReason) {
        self.update(|snapshot| {
            if snapshot.state.is_running() {
                snapshot.state = RelaySessionState::Failed(reason);
            }
        });
    }

    pub(crate) fn forwarded(&self) {
        self.update(|snapshot| snapshot.forwarded_count += 1);
    }

    pub(crate) fn delivery_failed(&self) {
        self.update(|snapshot| snapshot.failed_delivery_count += 1);
    }
}

// ─────────────────────────────────────────────
// LifecycleManager
// ─────────────────────────────────────────────

/// The transports a session talks to.
#[derive(Clone)]
pub struct Transports {
    pub source: Arc<dyn SourceConnector>,
    pub destination: Arc<dyn DestinationSender>,
    /// Used only when customization is enabled.
    pub rewriter: Option<Arc<dyn TextRewriter>>,
}

/// Owns the single active relay session.
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct LifecycleManager {
    source: Arc<dyn SourceConnector>,
    transformer: MessageTransformer,
    delivery: DeliveryWorker,
    slot: Arc<Mutex<Slot>>,
}

impl LifecycleManager {
    pub fn new(transports: Transports, settings: RelaySettings) -> Self {
        Self {
            source: transports.source,
            transformer: MessageTransformer::new(transports.rewriter),
            delivery: DeliveryWorker::new(transports.destination, settings),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Start relaying with `config`, replacing any active session.
    ///
    /// Preconditions are checked before anything changes. The replaced
    /// session is signalled to stop; the new one waits for it to close
    /// before connecting.
    pub async fn start(&self, auth: &AuthState, config: RelayConfig) -> Result<(), StartError> {
        if !auth.is_authenticated() {
            return Err(StartError::NotAuthenticated);
        }
        config.validate()?;

        let mut slot = lock(&self.slot);
        slot.generation += 1;
        let generation = slot.generation;

        let predecessor = match slot.active.take() {
            Some(previous) => {
                info!(
                    previous = previous.generation,
                    generation, "Replacing active relay session"
                );
                previous.shutdown.notify_one();
                slot.retiring.retain(|handle| !handle.is_finished());
                slot.retiring.push(previous.handle);
                Some(previous.done)
            }
            None => None,
        };

        slot.snapshot = StatusSnapshot {
            state: RelaySessionState::Starting,
            resolved_channel_count: 0,
            has_destination_credential: config.has_destination_credential(),
            forwarded_count: 0,
            failed_delivery_count: 0,
        };

        let shutdown = Arc::new(Notify::new());
        let (done_tx, done_rx) = watch::channel(false);
        let session = RelaySession {
            config,
            source: self.source.clone(),
            transformer: self.transformer.clone(),
            delivery: self.delivery.clone(),
            reporter: StatusReporter {
                slot: self.slot.clone(),
                generation,
            },
            shutdown: shutdown.clone(),
            predecessor,
            done: done_tx,
            phase: SessionPhase::Connecting,
        };

        let handle = tokio::spawn(session.supervise());
        slot.active = Some(ActiveSession {
            generation,
            shutdown,
            handle,
            done: done_rx,
        });

        info!(generation, "Relay session starting");
        Ok(())
    }

    /// Stop the active session and wait for it to tear down.
    ///
    /// No-op when nothing is running. Clears a previous failure to `Stopped`.
    pub async fn stop(&self) -> Result<(), StopError> {
        let (generation, handles) = {
            let mut slot = lock(&self.slot);
            let mut handles = std::mem::take(&mut slot.retiring);
            if let Some(active) = slot.active.take() {
                active.shutdown.notify_one();
                handles.push(active.handle);
            }
            if handles.is_empty() {
                slot.snapshot.state = RelaySessionState::Stopped;
                debug!("Stop requested with no active session");
                return Ok(());
            }
            slot.snapshot.state = RelaySessionState::Stopping;
            (slot.generation, handles)
        };

        info!(sessions = handles.len(), "Stopping relay");
        let mut result = Ok(());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Relay session task ended abnormally");
                if result.is_ok() {
                    result = Err(StopError::Join(e.to_string()));
                }
            }
        }

        let mut slot = lock(&self.slot);
        // A `start` that raced this stop owns the snapshot now.
        if slot.generation == generation && slot.active.is_none() {
            slot.snapshot.state = RelaySessionState::Stopped;
            info!("Relay stopped");
        }
        result
    }

    /// Current snapshot. Never blocks on I/O.
    pub fn status(&self) -> StatusSnapshot {
        lock(&self.slot).snapshot.clone()
    }
}
