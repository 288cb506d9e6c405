//! `Database` trait: single async interface for respondent and interview persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::interview::{Interview, InterviewTurn};
use crate::persona::{PersonaProfile, RespondentTrait};

/// A persisted respondent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPersona {
    pub id: Uuid,
    pub respondent_trait: RespondentTrait,
    pub profile: PersonaProfile,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering respondents, interviews and turns.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Respondents ─────────────────────────────────────────────────

    /// Store a synthesized respondent. Returns its new id.
    async fn create_persona(
        &self,
        respondent_trait: RespondentTrait,
        profile: &PersonaProfile,
    ) -> Result<Uuid, DatabaseError>;

    /// Get a respondent by id.
    async fn get_persona(&self, id: Uuid) -> Result<Option<StoredPersona>, DatabaseError>;

    /// Most recent respondents first, up to `limit`.
    async fn list_personas(&self, limit: usize) -> Result<Vec<StoredPersona>, DatabaseError>;

    // ── Interviews ──────────────────────────────────────────────────

    /// Open an interview with a respondent. Returns its new id.
    async fn create_interview(
        &self,
        persona_id: Uuid,
        hypothesis: &str,
    ) -> Result<Uuid, DatabaseError>;

    /// Get an interview by id.
    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>, DatabaseError>;

    /// Interviews held with a respondent, oldest first.
    async fn list_persona_interviews(
        &self,
        persona_id: Uuid,
    ) -> Result<Vec<Interview>, DatabaseError>;

    /// Append a turn. Fails with `NotFound` when the interview does not exist.
    async fn append_turn(
        &self,
        interview_id: Uuid,
        question: &str,
        answer: &str,
    ) -> Result<InterviewTurn, DatabaseError>;

    /// Turns of an interview in the order they were appended.
    async fn list_turns(&self, interview_id: Uuid) -> Result<Vec<InterviewTurn>, DatabaseError>;
}
