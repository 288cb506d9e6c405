//! Provider-agnostic request/response types and the `LlmProvider` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message.
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

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// One system message followed by one user message.
    pub fn chat(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ])
    }
}

/// Completion text, tagged by the envelope field it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionText {
    /// The primary `content` field.
    Content(String),
    /// The `reasoning` field, used when `content` was absent or empty.
    Reasoning(String),
}

impl CompletionText {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Content(s) | Self::Reasoning(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Content(s) | Self::Reasoning(s) => s,
        }
    }

    pub fn is_reasoning(&self) -> bool {
        matches!(self, Self::Reasoning(_))
    }
}

/// A successful completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: CompletionText,
    /// Model that served the request, when the provider reports it.
    pub model: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A chat-completion backend.
///
/// Implementations never retry; callers wrap calls with
/// [`complete_with_retry`](crate::llm::retry::complete_with_retry).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier used for requests.
    fn model_name(&self) -> &str;

    /// Send a completion request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Send a system prompt plus one user prompt.
    async fn complete_chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<CompletionResponse, LlmError> {
        self.complete(CompletionRequest::chat(system_prompt, user_prompt))
            .await
    }
}
