//! Interviews with a synthesized persona.

pub mod model;
pub mod prompts;
pub mod responder;

pub use model::{DEFAULT_HYPOTHESIS, Interview, InterviewTurn};
pub use responder::InterviewResponder;
