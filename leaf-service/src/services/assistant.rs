//! Follow-up question answering about an identified plant.

use super::metrics;
use super::providers::{ChatMessage, ChatProvider, ProviderErrorKind};
use crate::classifier::Label;
use serde::Serialize;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful medicinal plant assistant.";

/// User prompt for one question about `label`.
pub fn compose_prompt(label: &Label, question: &str) -> String {
    format!(
        "You are a medicinal plants expert. Provide a clear, student-friendly, detailed answer \
         in less than 150 words about the following identified plant:\n\n\
         Plant: {label}\n\n\
         User's Question: {question}\n\n\
         Explain in structured bullet points if possible."
    )
}

/// System instruction plus the composed prompt. No earlier turns.
pub fn build_messages(label: &Label, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(compose_prompt(label, question)),
    ]
}

/// Outcome of asking the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    /// Provider text, to be rendered as-is.
    Text { text: String },
    Failed {
        provider: String,
        kind: ProviderErrorKind,
        detail: String,
    },
}

impl Answer {
    pub fn is_failed(&self) -> bool {
        matches!(self, Answer::Failed { .. })
    }

    /// The markup-or-message shown to the user.
    pub fn display_text(&self) -> String {
        match self {
            Answer::Text { text } => text.clone(),
            Answer::Failed {
                provider, detail, ..
            } => format!(
                "An error occurred while fetching data from {}: {}",
                provider, detail
            ),
        }
    }
}

/// Ask `provider` one question about `label`. Provider failures come back as
/// [`Answer::Failed`]; nothing here can fail the caller.
pub async fn answer_question(provider: &dyn ChatProvider, label: &Label, question: &str) -> Answer {
    let messages = build_messages(label, question);

    match provider.complete(&messages).await {
        Ok(completion) => {
            tracing::info!(
                provider = provider.name(),
                model = provider.model(),
                label = %label,
                input_tokens = ?completion.input_tokens,
                output_tokens = ?completion.output_tokens,
                "Answered plant question"
            );
            metrics::record_question("answered");
            Answer::Text {
                text: completion.text,
            }
        }
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                label = %label,
                error = %e,
                "Chat completion failed"
            );
            metrics::record_question(e.kind().as_str());
            Answer::Failed {
                provider: provider.name().to_string(),
                kind: e.kind(),
                detail: e.to_string(),
            }
        }
    }
}
