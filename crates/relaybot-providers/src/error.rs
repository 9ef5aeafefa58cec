use thiserror::Error;

/// Failure talking to a generative-text provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no configured provider for model '{model}' (set {hint})")]
    NotConfigured { model: String, hint: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("response contained no choices")]
    NoChoices,
}

impl ProviderError {
    /// Rate limiting or quota exhaustion reported by the provider.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::Api { status: 429, .. })
    }
}
