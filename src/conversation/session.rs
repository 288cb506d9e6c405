//! Per-chat session context and the store that owns it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::persona::RespondentTrait;

use super::state::ConversationState;

/// Context accumulated by one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// `<channel>:<chat id>`.
    pub key: String,
    pub state: ConversationState,
    pub respondent_trait: Option<RespondentTrait>,
    pub profession: Option<String>,
    pub age: Option<u32>,
    /// Respondent currently being interviewed.
    pub persona_id: Option<Uuid>,
    /// Open interview record. Created lazily on the first answered question.
    pub interview_id: Option<Uuid>,
    /// Hypothesis for the next interview record.
    pub hypothesis: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: ConversationState::default(),
            respondent_trait: None,
            profession: None,
            age: None,
            persona_id: None,
            interview_id: None,
            hypothesis: None,
            last_activity: Utc::now(),
        }
    }

    /// Drop everything but the key.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.key));
    }

    /// Move to `target`, logging the transition.
    pub fn transition_to(&mut self, target: ConversationState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "invalid transition {} -> {}",
            self.state,
            target
        );
        if self.state != target {
            tracing::debug!(session = %self.key, from = %self.state, to = %target, "State transition");
        }
        self.state = target;
    }

    /// Forget the respondent-creation answers.
    pub fn clear_selections(&mut self) {
        self.respondent_trait = None;
        self.profession = None;
        self.age = None;
    }
}

/// Sessions keyed by `<channel>:<chat id>`.
///
/// Handlers work on a cloned [`Session`] and [`commit`](Self::commit) it when
/// the step completes, so an abandoned step leaves the stored session as it was.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the session for `key`, or a fresh one.
    pub async fn get_or_create(&self, key: &str) -> Session {
        if let Some(session) = self.sessions.read().await.get(key) {
            return session.clone();
        }
        Session::new(key)
    }

    /// Store `session`, stamping its activity time.
    pub async fn commit(&self, mut session: Session) {
        session.last_activity = Utc::now();
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session);
    }

    /// Drop sessions idle for longer than `timeout`. Returns how many went.
    pub async fn evict_idle(&self, timeout: Duration) -> usize {
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return 0;
        };
        let cutoff = Utc::now() - timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity >= cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Overwrite a session without touching its activity time.
    #[cfg(test)]
    pub(crate) async fn put_raw(&self, session: Session) {
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session);
    }
}
