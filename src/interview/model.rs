//! Interview records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hypothesis recorded when the operator never stated one.
pub const DEFAULT_HYPOTHESIS: &str = "Not specified";

/// One interview session with a persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub persona_id: Uuid,
    pub hypothesis: String,
    pub created_at: DateTime<Utc>,
}

/// A question and the persona's answer. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewTurn {
    /// Position within the interview, starting at 1.
    pub seq: i64,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// The hypothesis to record, falling back to [`DEFAULT_HYPOTHESIS`].
pub fn hypothesis_or_default(hypothesis: Option<&str>) -> &str {
    hypothesis
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_HYPOTHESIS)
}
