//! Generative language model abstraction and implementations.
//!
//! Every model call in the pipeline goes through the `LanguageModel` trait: a
//! list of role-tagged messages, a sampling temperature and an output token
//! budget in, free text out. Prompts are plain text built by interpolation;
//! no tool calling is used.

pub mod mistral;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when calling a language model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network or API communication error
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Provider asked us to slow down
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Response body did not have the expected shape
    #[error("Failed to parse model response: {0}")]
    ResponseParse(String),

    /// Configuration error (e.g., missing API key)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for language model operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// The usual shape: one system instruction followed by one user turn.
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature,
            max_tokens,
        }
    }

    /// Content of the first message with the given role.
    pub fn content_of(&self, role: Role) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }

    /// Total prompt size in characters, for logging.
    pub fn prompt_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// Trait for generative language models.
///
/// Implementations block (asynchronously) until the full completion is
/// available. They are constructed explicitly and injected into pipeline
/// components, so tests can substitute deterministic stubs.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the model's text.
    ///
    /// # Errors
    /// Returns `LlmError` on transport, authentication or response-shape failures
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String>;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<T> LanguageModel for Arc<T>
where
    T: LanguageModel + ?Sized,
{
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        (**self).complete(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = CompletionRequest::new("sys", "usr", 0.3, 500);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.content_of(Role::System), Some("sys"));
        assert_eq!(request.content_of(Role::User), Some("usr"));
        assert_eq!(request.content_of(Role::Assistant), None);
        assert_eq!(request.prompt_chars(), 6);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }
}
