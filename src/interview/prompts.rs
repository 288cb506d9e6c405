//! Prompts for in-character interview answers.

use crate::persona::PersonaProfile;

/// System prompt for interview answering.
pub const INTERVIEW_SYSTEM_PROMPT: &str = "\
You are role-playing a respondent in a customer development interview. \
Stay in character and answer in plain conversational prose. \
Never output JSON, code blocks or notes about the role-play.";

/// Build the user prompt for one interview question.
pub fn interview_prompt(question: &str, profile: &PersonaProfile) -> String {
    format!(
        "\
You are a respondent with the following profile:
{profile}

Question: {question}

Answer the question in line with your profile, using your communication style and \
applying one of your dodging patterns at random. The answer must sound realistic and \
reflect your pain points.",
        profile = profile.to_prompt_section(),
    )
}
