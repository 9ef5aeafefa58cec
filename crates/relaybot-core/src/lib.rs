//! Relaybot Core — shared types, errors, configuration, and utilities.
//!
//! Everything the relay engine and its transports agree on lives here:
//! - **types**: relay config, inbound events, session state, status snapshot,
//!   and the OpenAI-compatible chat wire format
//! - **error**: the error taxonomy for start/stop, resolution, delivery, and transports
//! - **config**: `~/.relaybot/config.json` schema + loader with env overrides
//! - **utils**: paths and string helpers

pub mod config;
pub mod error;
pub mod types;
pub mod utils;
