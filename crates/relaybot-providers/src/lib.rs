//! Generative-text provider layer for Relaybot.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — trait that all providers implement
//! - [`registry`] — static specs for the supported providers + matching logic
//! - [`http_provider::HttpProvider`] — generic OpenAI-compatible HTTP client
//! - [`rewriter::ProviderRewriter`] — the relay's `TextRewriter`, backed by a provider

pub mod error;
pub mod http_provider;
pub mod registry;
pub mod rewriter;
pub mod traits;

pub use error::ProviderError;
pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ProviderConfig, ProviderSpec, PROVIDERS};
pub use rewriter::{ProviderRewriter, TextRewriter};
pub use traits::{LlmProvider, LlmRequestConfig};
