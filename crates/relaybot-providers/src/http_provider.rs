//! Generic HTTP-based provider for OpenAI-compatible APIs.
//!
//! Talks directly to any `/chat/completions` endpoint: Gemini (through its
//! OpenAI compatibility layer), OpenAI, Anthropic, DeepSeek, Groq, OpenRouter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use relaybot_core::types::{ChatCompletionRequest, ChatCompletionResponse, LlmResponse, Message};

use crate::error::ProviderError;
use crate::registry::{resolve_model_name, ProviderConfig, ProviderSpec};
use crate::traits::{LlmProvider, LlmRequestConfig};

/// Upper bound for a single HTTP exchange. Callers usually apply a tighter one.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A provider that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    default_model: String,
    /// Extra headers to send with each request (e.g. OpenRouter `X-Title`).
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Create a new HttpProvider from a provider config and spec.
    ///
    /// The API base comes from the config when set, otherwise from the spec.
    pub fn new(
        config: &ProviderConfig,
        spec: &'static ProviderSpec,
        model: &str,
    ) -> Result<Self, ProviderError> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}", key);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(HttpProvider {
            client,
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers,
            spec,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, ProviderError> {
        let resolved_model = resolve_model_name(model, self.spec);

        debug!(
            provider = self.spec.display_name,
            model = %resolved_model,
            messages = messages.len(),
            "Calling LLM"
        );

        let request_body = ChatCompletionRequest {
            model: resolved_model,
            messages: messages.to_vec(),
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
                ProviderError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_resp = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let llm_resp = chat_resp.into_response().ok_or(ProviderError::NoChoices)?;
        debug!(
            provider = self.spec.display_name,
            has_content = llm_resp.content.is_some(),
            finish_reason = llm_resp.finish_reason.as_deref().unwrap_or("?"),
            "LLM response received"
        );
        Ok(llm_resp)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build an HttpProvider from a model name and a map of provider configs.
///
/// Matches the model to a configured provider and creates the client.
pub fn create_provider(
    model: &str,
    providers: &HashMap<String, ProviderConfig>,
) -> Result<HttpProvider, ProviderError> {
    let (config, spec) = crate::registry::match_provider(model, providers).ok_or_else(|| {
        let hint = crate::registry::find_by_model(model)
            .map(|s| s.env_key)
            .unwrap_or("RELAYBOT_PROVIDERS__OPENROUTER__API_KEY");
        ProviderError::NotConfigured {
            model: model.to_string(),
            hint: hint.to_string(),
        }
    })?;

    debug!(
        provider = spec.display_name,
        model = model,
        api_base = config.api_base.as_deref().unwrap_or(spec.default_api_base),
        "Creating LLM provider"
    );

    HttpProvider::new(config, spec, model)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::find_by_name;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(api_key: &str, api_base: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            api_base: api_base.map(String::from),
            extra_headers: None,
        }
    }

    fn provider(name: &str, api_base: Option<&str>, model: &str) -> HttpProvider {
        let spec = find_by_name(name).unwrap();
        HttpProvider::new(&make_config("test-key-123", api_base), spec, model).unwrap()
    }

    #[test]
    fn test_completions_url_trailing_slash() {
        let p = provider("openai", Some("https://api.openai.com/v1/"), "gpt-4o");
        assert_eq!(p.completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_default_api_base_for_gemini() {
        let p = provider("gemini", None, "gemini-2.0-flash");
        assert_eq!(
            p.completions_url(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_config_overrides_default_base() {
        let p = provider("openrouter", Some("https://custom.proxy.com/v1"), "x");
        assert_eq!(p.api_base, "https://custom.proxy.com/v1");
    }

    #[test]
    fn test_extra_headers() {
        let spec = find_by_name("openrouter").unwrap();
        let mut headers = HashMap::new();
        headers.insert("X-Title".to_string(), "relaybot".to_string());
        let config = ProviderConfig {
            api_key: "key".to_string(),
            api_base: None,
            extra_headers: Some(headers),
        };
        let p = HttpProvider::new(&config, spec, "google/gemini-2.0-flash").unwrap();
        assert!(p.extra_headers.contains_key("x-title"));
    }

    #[tokio::test]
    async fn test_chat_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-test",
                "choices": [{
                    "message": { "content": "Hello from the relay." },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            })))
            .mount(&mock_server)
            .await;

        let p = provider("gemini", Some(&mock_server.uri()), "gemini-2.0-flash");
        let messages = vec![Message::system("Rewrite."), Message::user("Hello")];

        let resp = p
            .chat(&messages, "gemini-2.0-flash", &LlmRequestConfig::default())
            .await
            .unwrap();

        assert_eq!(resp.text(), Some("Hello from the relay."));
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn test_chat_sends_correct_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gemini-2.0-flash",
                "max_tokens": 1024,
                "messages": [
                    { "role": "system", "content": "Be brief" },
                    { "role": "user", "content": "hi" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }]
            })))
            .mount(&mock_server)
            .await;

        let p = provider("gemini", Some(&mock_server.uri()), "gemini-2.0-flash");
        let messages = vec![Message::system("Be brief"), Message::user("hi")];

        // The routing prefix is stripped before the request is sent.
        let resp = p
            .chat(&messages, "gemini/gemini-2.0-flash", &LlmRequestConfig::default())
            .await
            .unwrap();
        assert_eq!(resp.text(), Some("ok"));
    }

    #[tokio::test]
    async fn test_chat_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&mock_server)
            .await;

        let p = provider("gemini", Some(&mock_server.uri()), "gemini-2.0-flash");
        let err = p
            .chat(&[Message::user("Hello")], "gemini-2.0-flash", &LlmRequestConfig::default())
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_chat_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&mock_server)
            .await;

        let p = provider("openai", Some(&mock_server.uri()), "gpt-4o-mini");
        let err = p
            .chat(&[Message::user("Hello")], "gpt-4o-mini", &LlmRequestConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoChoices));
    }

    #[tokio::test]
    async fn test_chat_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let p = provider("openai", Some(&mock_server.uri()), "gpt-4o-mini");
        let err = p
            .chat(&[Message::user("Hello")], "gpt-4o-mini", &LlmRequestConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_chat_network_error() {
        let p = provider("openai", Some("http://127.0.0.1:1"), "gpt-4o");
        let err = p
            .chat(&[Message::user("Hello")], "gpt-4o", &LlmRequestConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }

    #[test]
    fn test_create_provider_success() {
        let mut providers = HashMap::new();
        providers.insert("gemini".to_string(), make_config("g-123", None));

        let p = create_provider("gemini-2.0-flash", &providers).unwrap();
        assert_eq!(p.display_name(), "Gemini");
        assert_eq!(p.default_model(), "gemini-2.0-flash");
    }

    #[test]
    fn test_create_provider_no_config() {
        let err = create_provider("gemini-2.0-flash", &HashMap::new()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("gemini-2.0-flash"));
        assert!(text.contains("RELAYBOT_PROVIDERS__GEMINI__API_KEY"));
    }
}
