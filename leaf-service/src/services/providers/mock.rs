//! Mock provider implementation for testing.

use super::{ChatCompletion, ChatMessage, ChatProvider, ProviderError};
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always reply with this text.
    Reply(String),
    /// Reply with the last user message prefixed by `"Mock response for: "`.
    Echo,
    /// Always fail with this error.
    Fail(ProviderError),
}

/// Mock chat provider that records every request it receives.
pub struct MockChatProvider {
    behavior: Mutex<MockBehavior>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Reply(text.into()))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Fail(error))
    }

    /// Swap the behavior for subsequent calls.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap_or_else(|e| e.into_inner()) = behavior;
    }

    /// Every message list passed to `complete`, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_request(&self) -> Option<Vec<ChatMessage>> {
        self.requests().pop()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let text = match behavior {
            MockBehavior::Reply(text) => text,
            MockBehavior::Echo => {
                let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
                format!("Mock response for: {}", last)
            }
            MockBehavior::Fail(err) => return Err(err),
        };

        Ok(ChatCompletion {
            input_tokens: Some(messages.iter().map(|m| m.content.len() as u32 / 4).sum()),
            output_tokens: Some(text.len() as u32 / 4),
            text,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
