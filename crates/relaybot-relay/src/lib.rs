//! Relaybot relay engine.
//!
//! Leaves first:
//! - [`resolver`] — channel links → `ResolvedChannel`s, validated against the live source
//! - [`transformer`] — optional generative rewrite with canonical fallback
//! - [`delivery`] — destination send with bounded, fixed-delay retry
//! - [`session`] — one source connection, filtered and processed sequentially
//! - [`lifecycle`] — start/stop/status with a single active session

pub mod delivery;
pub mod lifecycle;
pub mod resolver;
pub mod session;
pub mod transformer;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{DeliveryWorker, RelaySettings, DELIVERY_RETRY_DELAY, MAX_DELIVERY_ATTEMPTS};
pub use lifecycle::{LifecycleManager, Transports};
pub use resolver::{parse_link, resolve, resolve_all, ChannelLink, Resolution};
pub use session::SessionPhase;
pub use transformer::MessageTransformer;
