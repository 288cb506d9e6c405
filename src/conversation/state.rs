//! Conversation state machine: tracks where a chat is in the respondent flow.

use serde::{Deserialize, Serialize};

/// States of one chat.
///
/// ChoosingRespondent → WaitingProfession → WaitingAge → Interview, with
/// Interview ⇄ HypothesisInput for restating the hypothesis under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    ChoosingRespondent,
    WaitingProfession,
    WaitingAge,
    HypothesisInput,
    Interview,
}

impl ConversationState {
    pub const ALL: [ConversationState; 5] = [
        Self::ChoosingRespondent,
        Self::WaitingProfession,
        Self::WaitingAge,
        Self::HypothesisInput,
        Self::Interview,
    ];

    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Staying put (re-prompting) and resetting to `ChoosingRespondent` are
    /// always allowed.
    pub fn can_transition_to(&self, target: ConversationState) -> bool {
        use ConversationState::*;
        *self == target
            || target == ChoosingRespondent
            || matches!(
                (self, target),
                (ChoosingRespondent, WaitingProfession)
                    | (ChoosingRespondent, HypothesisInput)
                    | (WaitingProfession, WaitingAge)
                    | (WaitingAge, Interview)
                    | (Interview, HypothesisInput)
                    | (HypothesisInput, Interview)
            )
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::ChoosingRespondent
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ChoosingRespondent => "choosing_respondent",
            Self::WaitingProfession => "waiting_profession",
            Self::WaitingAge => "waiting_age",
            Self::HypothesisInput => "hypothesis_input",
            Self::Interview => "interview",
        };
        write!(f, "{s}")
    }
}
