//! Profile synthesizer: turns (age, profession, trait) into a validated persona.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::SynthesisError;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::{RetryPolicy, complete_with_retry};
use crate::sanitize::{self, Extraction};

use super::model::{PersonaProfile, ProfileWarning, RespondentTrait};
use super::prompts::{SYNTHESIS_SYSTEM_PROMPT, synthesis_prompt};

/// A persona ready to be stored and shown.
#[derive(Debug, Clone)]
pub struct SynthesizedPersona {
    pub profile: PersonaProfile,
    pub warnings: Vec<ProfileWarning>,
    /// Chat-ready summary of the profile.
    pub summary: String,
}

/// Synthesizes respondent profiles through an LLM.
pub struct ProfileSynthesizer {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl ProfileSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Create one respondent profile.
    pub async fn synthesize(
        &self,
        age: u32,
        profession: &str,
        respondent_trait: RespondentTrait,
    ) -> Result<SynthesizedPersona, SynthesisError> {
        info!(
            age,
            profession,
            respondent_trait = %respondent_trait,
            "Synthesizing respondent profile"
        );

        let request = CompletionRequest::chat(
            SYNTHESIS_SYSTEM_PROMPT,
            synthesis_prompt(age, profession, respondent_trait),
        );
        let response = complete_with_retry(self.llm.as_ref(), &request, self.retry).await?;
        let raw = response.text.into_string();

        let profile = parse_profile(&raw)?;
        let warnings = profile.warnings();
        for warning in &warnings {
            warn!(name = %profile.name, %warning, "Profile outside expected ranges");
        }

        info!(name = %profile.name, age = profile.age, "Respondent profile synthesized");
        let summary = profile.summary_message();
        Ok(SynthesizedPersona {
            profile,
            warnings,
            summary,
        })
    }
}

/// Extract and validate a profile from raw model text.
pub fn parse_profile(raw: &str) -> Result<PersonaProfile, SynthesisError> {
    let extraction = sanitize::extract(raw);
    if !matches!(extraction, Extraction::Valid(_)) {
        debug!("No strictly valid JSON span; trying heuristic candidate");
    }

    let map: serde_json::Map<String, serde_json::Value> =
        match serde_json::from_str(extraction.as_str()) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, raw, "Model output is not a JSON object");
                return Err(SynthesisError::MalformedOutput {
                    raw: raw.to_string(),
                    reason: e.to_string(),
                });
            }
        };

    PersonaProfile::from_json_map(map).map_err(|e| match e {
        SynthesisError::IncompleteProfile(missing) => {
            error!(?missing, raw, "Profile is missing required fields");
            SynthesisError::IncompleteProfile(missing)
        }
        SynthesisError::MalformedOutput { reason, .. } => {
            warn!(%reason, raw, "Profile fields have unexpected types");
            SynthesisError::MalformedOutput {
                raw: raw.to_string(),
                reason,
            }
        }
        other => other,
    })
}
