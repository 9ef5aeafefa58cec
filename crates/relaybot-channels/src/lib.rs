//! Relaybot Channels — platform transports.
//!
//! This crate provides:
//! - **base**: the capability traits the relay engine consumes
//!   (`SourceConnector`, `SourceConnection`, `ChannelDirectory`, `DestinationSender`)
//! - **discord**: Gateway v10 WebSocket source + REST channel directory
//! - **telegram**: Bot API destination via `teloxide`

pub mod base;

#[cfg(feature = "telegram")]
pub mod telegram;

#[cfg(feature = "discord")]
pub mod discord;

pub use base::{ChannelDirectory, DestinationSender, SourceConnection, SourceConnector};
