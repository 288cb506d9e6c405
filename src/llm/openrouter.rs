//! HTTP client for OpenAI-compatible chat-completion endpoints.
//!
//! One request per call. Retrying is the caller's job.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::error::LlmError;
use crate::llm::envelope::Envelope;
use crate::llm::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-zero:free";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in an `LlmError::Http`.
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Chat-completion client authenticated with a bearer key.
pub struct OpenRouterClient {
    client: Client,
    api_key: SecretString,
    model: String,
    endpoint: String,
    provider: &'static str,
}

impl OpenRouterClient {
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Self::with_endpoint(api_key, model, OPENROUTER_API_URL, timeout)
    }

    /// Client against a custom endpoint URL (OpenAI, a proxy, or a test server).
    pub fn with_endpoint(
        api_key: SecretString,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport {
                provider: "openrouter".to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            endpoint: endpoint.into(),
            provider: "openrouter",
        })
    }

    /// Name reported in errors and logs.
    pub fn with_provider_name(mut self, provider: &'static str) -> Self {
        self.provider = provider;
        self
    }

    fn transport(&self, e: reqwest::Error) -> LlmError {
        let reason = if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            e.to_string()
        };
        LlmError::Transport {
            provider: self.provider.to_string(),
            reason,
        }
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[async_trait]
impl LlmProvider for OpenRouterClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequestBody {
            model: &self.model,
            messages: &request.messages,
        };

        tracing::debug!(
            provider = self.provider,
            model = %self.model,
            messages = request.messages.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport(e))?;

        if status != reqwest::StatusCode::OK {
            tracing::warn!(
                provider = self.provider,
                status = status.as_u16(),
                "Chat completion returned non-200"
            );
            return Err(LlmError::Http {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        let completion = Envelope::parse(&text).into_response(self.provider)?;
        if completion.text.is_reasoning() {
            tracing::debug!(provider = self.provider, "Using reasoning field as completion text");
        }
        tracing::debug!(
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "Chat completion received"
        );
        Ok(completion)
    }
}
