//! Bounded retry for transient LLM failures.

use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Retry limits for one logical LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    /// Base of the exponential backoff.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.base_delay_ms)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_retries)
    }
}

/// Send `request`, retrying transport failures, 429 and 5xx responses.
///
/// Malformed envelopes and other HTTP statuses fail on the first attempt.
pub async fn complete_with_retry(
    llm: &dyn LlmProvider,
    request: &CompletionRequest,
    policy: RetryPolicy,
) -> Result<CompletionResponse, LlmError> {
    let mut attempt = 0usize;

    let result = RetryIf::spawn(
        policy.strategy(),
        || {
            attempt += 1;
            let n = attempt;
            let request = request.clone();
            async move {
                tracing::debug!(attempt = n, model = llm.model_name(), "LLM request");
                llm.complete(request).await
            }
        },
        |e: &LlmError| {
            let retry = e.is_transient();
            if retry {
                tracing::warn!(kind = %e.kind(), error = %e, "Transient LLM failure, retrying");
            }
            retry
        },
    )
    .await;

    if let Err(ref e) = result {
        tracing::error!(
            attempts = attempt,
            kind = %e.kind(),
            error = %e,
            "LLM request failed"
        );
    }

    result
}
