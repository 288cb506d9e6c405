//! Prompts for respondent synthesis.

use super::model::RespondentTrait;

/// System prompt for profile synthesis.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are an expert at creating realistic respondent profiles for customer development interviews. \
Your answers must be in JSON format.";

/// Build the user prompt asking for one respondent profile.
///
/// The output is a pure function of the inputs.
pub fn synthesis_prompt(age: u32, profession: &str, respondent_trait: RespondentTrait) -> String {
    format!(
        "\
Create a respondent profile with the following characteristics:
- Age: {age}
- Profession: {profession}
- Character: {character}

Return a JSON profile in exactly this format:
{{
    \"name\": \"realistic full name\",
    \"age\": number,
    \"profession\": \"profession\",
    \"pain_points\": [\"3-4 key pain points\"],
    \"communication_style\": \"2-3 sentences about how this person communicates\",
    \"traps\": [\"3-4 ways this respondent avoids giving direct answers\"]
}}",
        character = respondent_trait.prompt_description(),
    )
}
