//! Respondent personas: data model, synthesis prompts and the synthesizer.

pub mod model;
pub mod prompts;
pub mod synthesizer;

pub use model::{PersonaProfile, ProfileWarning, REQUIRED_FIELDS, RespondentTrait};
pub use synthesizer::{ProfileSynthesizer, SynthesizedPersona};
