//! Interview responder: answers operator questions in the persona's voice.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ResponseError;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{RetryPolicy, complete_with_retry};
use crate::persona::PersonaProfile;
use crate::sanitize::strip_structural_artifacts;

use super::prompts::{INTERVIEW_SYSTEM_PROMPT, interview_prompt};

/// Produces in-character answers through an LLM.
pub struct InterviewResponder {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl InterviewResponder {
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Answer `question` as `profile`.
    ///
    /// Fenced code and brace-delimited spans are stripped from the reply. The
    /// result may be empty; callers decide what to show in that case.
    pub async fn respond(
        &self,
        question: &str,
        profile: &PersonaProfile,
    ) -> Result<String, ResponseError> {
        info!(persona = %profile.name, "Generating interview answer");

        let request =
            CompletionRequest::chat(INTERVIEW_SYSTEM_PROMPT, interview_prompt(question, profile));
        let response = complete_with_retry(self.llm.as_ref(), &request, self.retry).await?;
        if response.text.is_reasoning() {
            debug!("Answer taken from reasoning field");
        }

        let answer = strip_structural_artifacts(response.text.as_str());
        if answer.is_empty() {
            warn!(raw = response.text.as_str(), "Answer is empty after stripping artifacts");
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionResponse, CompletionText};

    struct FixedLlm(Result<CompletionText, ()>);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            match &self.0 {
                Ok(text) => Ok(CompletionResponse {
                    text: text.clone(),
                    model: None,
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Err(()) => Err(LlmError::Transport {
                    provider: "fixed".into(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    fn profile() -> PersonaProfile {
        PersonaProfile {
            name: "Oleg".into(),
            age: 35,
            profession: "barista".into(),
            pain_points: vec!["early shifts".into(), "low tips".into()],
            communication_style: "Short and a bit sarcastic all the time.".into(),
            traps: vec!["jokes it off".into(), "says it depends".into()],
        }
    }

    fn responder(reply: Result<CompletionText, ()>) -> InterviewResponder {
        InterviewResponder::new(Arc::new(FixedLlm(reply)), RetryPolicy::none())
    }

    #[tokio::test]
    async fn strips_fences_and_json_and_trims() {
        let raw = "  Honestly? It depends.\n```json\n{\"mood\": \"annoyed\"}\n```\n{\"note\": 1}  ";
        let answer = responder(Ok(CompletionText::Content(raw.into())))
            .respond("Do you like mornings?", &profile())
            .await
            .unwrap();
        assert_eq!(answer, "Honestly? It depends.");
    }

    #[tokio::test]
    async fn reasoning_reply_is_used() {
        let answer = responder(Ok(CompletionText::Reasoning("Meh, who knows.".into())))
            .respond("Why?", &profile())
            .await
            .unwrap();
        assert_eq!(answer, "Meh, who knows.");
    }

    #[tokio::test]
    async fn empty_after_stripping_is_returned() {
        let answer = responder(Ok(CompletionText::Content("{\"answer\": \"no\"}".into())))
            .respond("Why?", &profile())
            .await
            .unwrap();
        assert!(answer.is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_reported() {
        let err = responder(Err(()))
            .respond("Why?", &profile())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResponseError::UpstreamFailure(LlmError::Transport { .. })
        ));
    }
}
