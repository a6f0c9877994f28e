//! Mistral chat-completions client.
//!
//! Talks to the OpenAI-style `/v1/chat/completions` endpoint that Mistral
//! exposes. Only plain text completions are used.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{CompletionRequest, LanguageModel, LlmError, LlmResult};

/// Default Mistral API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "open-mixtral-8x22b";

/// Mistral chat-completions provider.
#[derive(Debug, Clone)]
pub struct MistralClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl MistralClient {
    /// Create a client for the public Mistral API.
    ///
    /// # Arguments
    /// * `api_key` - Mistral API key
    /// * `model` - Model name (defaults to `open-mixtral-8x22b` if None)
    ///
    /// # Errors
    /// Returns `LlmError::ConfigError` if the key is blank
    pub fn new(api_key: String, model: Option<String>) -> LlmResult<Self> {
        if api_key.trim().is_empty() {
            return Err(LlmError::ConfigError(
                "Mistral API key is empty; set MISTRAL_API_KEY".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn parse_response(body: &Value) -> LlmResult<String> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::ResponseParse("No choices in response".to_string()))?;

        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::ResponseParse("No message content in choice".to_string()))
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed(format!("Mistral rejected credentials ({status})")),
            429 => LlmError::RateLimited {
                retry_after_secs: 5,
            },
            code if code >= 500 => LlmError::ApiError(format!("Server error ({status}): {body}")),
            _ => LlmError::ApiError(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl LanguageModel for MistralClient {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(request);

        debug!(
            url = %url,
            model = %self.model,
            prompt_chars = request.prompt_chars(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiError(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::ApiError(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &text));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::ResponseParse(format!("Invalid JSON: {e}")))?;

        Self::parse_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
