//! Chat-completion response envelope.
//!
//! The envelope is the JSON wrapper the endpoint returns around the model's
//! text. Classification is explicit: a body is either content-bearing,
//! reasoning-only, or malformed. Content wins over reasoning when both exist.

use serde::Deserialize;

use crate::error::LlmError;
use crate::llm::provider::{CompletionResponse, CompletionText};

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    choices: Vec<RawChoice>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(default)]
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Model and token accounting carried next to the text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeMeta {
    pub model: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A classified response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    ContentBearing { content: String, meta: EnvelopeMeta },
    ReasoningOnly { reasoning: String, meta: EnvelopeMeta },
    Malformed { reason: String },
}

/// `None` for absent, null, empty or whitespace-only text.
fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|s| !s.trim().is_empty())
}

impl Envelope {
    /// Classify a raw response body.
    pub fn parse(body: &str) -> Self {
        let raw: RawEnvelope = match serde_json::from_str(body) {
            Ok(raw) => raw,
            Err(e) => {
                return Self::Malformed {
                    reason: format!("body is not a completion envelope: {e}"),
                };
            }
        };

        let meta = EnvelopeMeta {
            model: raw.model,
            input_tokens: raw.usage.as_ref().map_or(0, |u| u.prompt_tokens),
            output_tokens: raw.usage.as_ref().map_or(0, |u| u.completion_tokens),
        };

        if let Some(choice) = raw.choices.into_iter().next() {
            let Some(message) = choice.message else {
                return Self::Malformed {
                    reason: "first choice has no message".to_string(),
                };
            };
            if let Some(content) = non_blank(message.content) {
                return Self::ContentBearing { content, meta };
            }
            if let Some(reasoning) = non_blank(message.reasoning) {
                return Self::ReasoningOnly { reasoning, meta };
            }
            return Self::Malformed {
                reason: "first choice has neither content nor reasoning".to_string(),
            };
        }

        if let Some(content) = non_blank(raw.response) {
            return Self::ContentBearing { content, meta };
        }

        if let Some(err) = raw.error {
            let message = err.message.unwrap_or_else(|| "unknown error".to_string());
            let reason = match err.code {
                Some(code) => format!("provider error {code}: {message}"),
                None => format!("provider error: {message}"),
            };
            return Self::Malformed { reason };
        }

        Self::Malformed {
            reason: "envelope has no choices".to_string(),
        }
    }

    /// Turn the envelope into a completion, or a `MalformedEnvelope` error.
    pub fn into_response(self, provider: &str) -> Result<CompletionResponse, LlmError> {
        let (text, meta) = match self {
            Self::ContentBearing { content, meta } => (CompletionText::Content(content), meta),
            Self::ReasoningOnly { reasoning, meta } => {
                (CompletionText::Reasoning(reasoning), meta)
            }
            Self::Malformed { reason } => {
                return Err(LlmError::MalformedEnvelope {
                    provider: provider.to_string(),
                    reason,
                });
            }
        };
        Ok(CompletionResponse {
            text,
            model: meta.model,
            input_tokens: meta.input_tokens,
            output_tokens: meta.output_tokens,
        })
    }
}
