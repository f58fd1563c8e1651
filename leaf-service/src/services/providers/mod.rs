//! Chat-completion provider abstractions and implementations.
//!
//! The assistant only ever needs a single-turn completion, so the trait is
//! deliberately small. Groq serves production traffic; the mock backs tests.

pub mod groq;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Coarse failure class, used for metrics and for choosing what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    NotConfigured,
    Unauthorized,
    RateLimited,
    Network,
    Api,
    MalformedResponse,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::NotConfigured => "not_configured",
            ProviderErrorKind::Unauthorized => "unauthorized",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Api => "api",
            ProviderErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::NotConfigured(_) => ProviderErrorKind::NotConfigured,
            ProviderError::Unauthorized(_) => ProviderErrorKind::Unauthorized,
            ProviderError::RateLimited => ProviderErrorKind::RateLimited,
            ProviderError::NetworkError(_) => ProviderErrorKind::Network,
            ProviderError::ApiError(_) => ProviderErrorKind::Api,
            ProviderError::MalformedResponse(_) => ProviderErrorKind::MalformedResponse,
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Generated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub text: String,

    /// Prompt tokens, when the provider reports usage.
    pub input_tokens: Option<u32>,

    /// Completion tokens, when the provider reports usage.
    pub output_tokens: Option<u32>,
}

/// A hosted chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Human-readable provider name, used in user-facing error text.
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;

    /// Complete one exchange. `messages` is the whole conversation; nothing
    /// from earlier calls is carried over.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError>;

    /// Cheap configuration check, no network round trip.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(ProviderError::RateLimited.kind(), ProviderErrorKind::RateLimited);
        assert_eq!(
            ProviderError::NetworkError("connection reset".into()).kind().as_str(),
            "network"
        );
    }
}
