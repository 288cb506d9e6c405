//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::interview::{Interview, InterviewTurn};
use crate::persona::{PersonaProfile, RespondentTrait};
use crate::store::migrations;
use crate::store::traits::{Database, StoredPersona};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn interview_exists(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM interviews WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("interview_exists: {e}")))?;
        rows.next()
            .await
            .map(|row| row.is_some())
            .map_err(|e| DatabaseError::Query(format!("interview_exists: {e}")))
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s)
        .map_err(|e| DatabaseError::Serialization(format!("{column} is not a UUID: {e}")))
}

const PERSONA_COLUMNS: &str = "id, trait, profile, created_at";

const INTERVIEW_COLUMNS: &str = "id, respondent_id, hypothesis, created_at";

const TURN_COLUMNS: &str = "seq, question, answer, created_at";

fn row_to_persona(row: &libsql::Row) -> Result<StoredPersona, DatabaseError> {
    let get_text = |i: i32| {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Query(format!("respondent column {i}: {e}")))
    };

    let id = parse_uuid(&get_text(0)?, "respondents.id")?;
    let respondent_trait: RespondentTrait = get_text(1)?
        .parse()
        .map_err(DatabaseError::Serialization)?;
    let profile: PersonaProfile = serde_json::from_str(&get_text(2)?)
        .map_err(|e| DatabaseError::Serialization(format!("respondents.profile: {e}")))?;

    Ok(StoredPersona {
        id,
        respondent_trait,
        profile,
        created_at: parse_datetime(&get_text(3)?),
    })
}

fn row_to_interview(row: &libsql::Row) -> Result<Interview, DatabaseError> {
    let get_text = |i: i32| {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Query(format!("interview column {i}: {e}")))
    };

    Ok(Interview {
        id: parse_uuid(&get_text(0)?, "interviews.id")?,
        persona_id: parse_uuid(&get_text(1)?, "interviews.respondent_id")?,
        hypothesis: get_text(2)?,
        created_at: parse_datetime(&get_text(3)?),
    })
}

fn row_to_turn(row: &libsql::Row) -> Result<InterviewTurn, DatabaseError> {
    let get_text = |i: i32| {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Query(format!("turn column {i}: {e}")))
    };

    Ok(InterviewTurn {
        seq: row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Query(format!("turn seq: {e}")))?,
        question: get_text(1)?,
        answer: get_text(2)?,
        created_at: parse_datetime(&get_text(3)?),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Respondents ─────────────────────────────────────────────────

    async fn create_persona(
        &self,
        respondent_trait: RespondentTrait,
        profile: &PersonaProfile,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let profile_json = serde_json::to_string(profile)
            .map_err(|e| DatabaseError::Serialization(format!("create_persona: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO respondents (id, name, age, profession, trait, profile, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    profile.name.as_str(),
                    i64::from(profile.age),
                    profile.profession.as_str(),
                    respondent_trait.as_str(),
                    profile_json,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_persona: {e}")))?;

        debug!(persona_id = %id, name = %profile.name, "Respondent stored");
        Ok(id)
    }

    async fn get_persona(&self, id: Uuid) -> Result<Option<StoredPersona>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PERSONA_COLUMNS} FROM respondents WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_persona: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_persona(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_persona: {e}"))),
        }
    }

    async fn list_personas(&self, limit: usize) -> Result<Vec<StoredPersona>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PERSONA_COLUMNS} FROM respondents ORDER BY created_at DESC, rowid DESC LIMIT ?1"
                ),
                params![limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_personas: {e}")))?;

        let mut personas = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_personas: {e}")))?
        {
            personas.push(row_to_persona(&row)?);
        }
        Ok(personas)
    }

    // ── Interviews ──────────────────────────────────────────────────

    async fn create_interview(
        &self,
        persona_id: Uuid,
        hypothesis: &str,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO interviews (id, respondent_id, hypothesis, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id.to_string(),
                    persona_id.to_string(),
                    hypothesis,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_interview: {e}")))?;

        debug!(interview_id = %id, persona_id = %persona_id, "Interview opened");
        Ok(id)
    }

    async fn get_interview(&self, id: Uuid) -> Result<Option<Interview>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_interview: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_interview(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_interview: {e}"))),
        }
    }

    async fn list_persona_interviews(
        &self,
        persona_id: Uuid,
    ) -> Result<Vec<Interview>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE respondent_id = ?1 ORDER BY created_at ASC, rowid ASC"
                ),
                params![persona_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_persona_interviews: {e}")))?;

        let mut interviews = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_persona_interviews: {e}")))?
        {
            interviews.push(row_to_interview(&row)?);
        }
        Ok(interviews)
    }

    async fn append_turn(
        &self,
        interview_id: Uuid,
        question: &str,
        answer: &str,
    ) -> Result<InterviewTurn, DatabaseError> {
        if !self.interview_exists(interview_id).await? {
            return Err(DatabaseError::NotFound {
                entity: "interview".to_string(),
                id: interview_id.to_string(),
            });
        }

        let now = Utc::now();
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO interview_turns (interview_id, seq, question, answer, created_at) \
                 SELECT ?1, COALESCE(MAX(seq), 0) + 1, ?2, ?3, ?4 FROM interview_turns WHERE interview_id = ?1 \
                 RETURNING seq",
                params![interview_id.to_string(), question, answer, now.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_turn: {e}")))?;

        let seq = match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("append_turn seq: {e}")))?,
            Ok(None) => {
                return Err(DatabaseError::Query(
                    "append_turn: insert returned no row".to_string(),
                ));
            }
            Err(e) => return Err(DatabaseError::Query(format!("append_turn: {e}"))),
        };

        debug!(interview_id = %interview_id, seq, "Interview turn stored");
        Ok(InterviewTurn {
            seq,
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: now,
        })
    }

    async fn list_turns(&self, interview_id: Uuid) -> Result<Vec<InterviewTurn>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {TURN_COLUMNS} FROM interview_turns WHERE interview_id = ?1 ORDER BY seq ASC"
                ),
                params![interview_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_turns: {e}")))?;

        let mut turns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_turns: {e}")))?
        {
            turns.push(row_to_turn(&row)?);
        }
        Ok(turns)
    }
}
