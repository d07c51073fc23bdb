use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::extraction::ExtractedArtifact;
use crate::models::artifact::{CareerAnalysis, Resume, ResumeTemplate};
use crate::models::session::{Message, Role, Session, SessionKind, SessionStatus};
use crate::models::summary::ContextSummary;
use crate::models::user::{decode_list, StudentContext, StudentProfile};
use crate::store::{SessionStore, Transition};

const SESSION_COLUMNS: &str = "id, user_id, kind, title, status, started_at, ended_at, \
     turn_count, session_summary, artifact_generated, template";

const MESSAGE_COLUMNS: &str = "id, session_id, user_id, role, content, message_order, created_at";

const RESUME_COLUMNS: &str =
    "id, session_id, user_id, resume_json, template, created_at, updated_at";

/// Postgres-backed [`SessionStore`].
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Row types. Text columns are decoded into the typed models at this boundary.
// ────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    status: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    turn_count: i32,
    session_summary: Option<String>,
    artifact_generated: bool,
    template: Option<String>,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            kind: SessionKind::parse(&row.kind)
                .ok_or_else(|| anyhow!("unknown session kind '{}'", row.kind))?,
            title: row.title,
            status: SessionStatus::parse(&row.status)
                .ok_or_else(|| anyhow!("unknown session status '{}'", row.status))?,
            started_at: row.started_at,
            ended_at: row.ended_at,
            turn_count: row.turn_count,
            session_summary: row.session_summary,
            artifact_generated: row.artifact_generated,
            template: row.template.as_deref().and_then(ResumeTemplate::parse),
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    role: String,
    content: String,
    message_order: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            role: Role::parse(&row.role).ok_or_else(|| anyhow!("unknown role '{}'", row.role))?,
            content: row.content,
            order: row.message_order,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CareerAnalysisRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    analysis_json: Option<Value>,
    analysis_markdown: Option<String>,
    roadmap_json: Option<Value>,
    created_at: DateTime<Utc>,
}

impl From<CareerAnalysisRow> for CareerAnalysis {
    fn from(row: CareerAnalysisRow) -> Self {
        CareerAnalysis {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            analysis_json: row.analysis_json,
            analysis_markdown: row.analysis_markdown,
            roadmap_json: row.roadmap_json,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ResumeRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    resume_json: Value,
    template: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ResumeRow> for Resume {
    fn from(row: ResumeRow) -> Self {
        Resume {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            resume_json: row.resume_json,
            // Rows predating a template rename fall back to the default.
            template: ResumeTemplate::parse(&row.template).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct StudentRow {
    name: String,
    college: String,
    has_profile: bool,
    education_level: Option<String>,
    class_or_year: Option<String>,
    board: Option<String>,
    stream: Option<String>,
    cgpa: Option<String>,
    city: Option<String>,
    state: Option<String>,
    parent_occupation: Option<String>,
    income_range: Option<String>,
    hobbies: Option<String>,
    interests: Option<String>,
    strengths: Option<String>,
    weaknesses: Option<String>,
    languages: Option<String>,
    career_aspiration_raw: Option<String>,
}

impl From<StudentRow> for StudentContext {
    fn from(row: StudentRow) -> Self {
        let profile = row.has_profile.then(|| StudentProfile {
            education_level: row.education_level,
            class_or_year: row.class_or_year,
            board: row.board,
            stream: row.stream,
            cgpa: row.cgpa,
            city: row.city,
            state: row.state,
            parent_occupation: row.parent_occupation,
            income_range: row.income_range,
            hobbies: decode_list(row.hobbies.as_deref()),
            interests: decode_list(row.interests.as_deref()),
            strengths: decode_list(row.strengths.as_deref()),
            weaknesses: decode_list(row.weaknesses.as_deref()),
            languages: decode_list(row.languages.as_deref()),
            career_aspiration: row.career_aspiration_raw,
        });
        StudentContext {
            name: row.name,
            institution: row.college,
            profile,
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn count_active_sessions(&self, user_id: Uuid, kind: SessionKind) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_sessions WHERE user_id = $1 AND kind = $2 AND status = 'active'",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_sessions
                (id, user_id, kind, title, status, started_at, turn_count, artifact_generated, template)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.kind.as_str())
        .bind(&session.title)
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(session.turn_count)
        .bind(session.artifact_generated)
        .bind(session.template.map(|t| t.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2"
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Session::try_from).transpose()
    }

    async fn list_sessions(&self, user_id: Uuid, kind: SessionKind) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions \
             WHERE user_id = $1 AND kind = $2 ORDER BY started_at DESC"
        ))
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Session::try_from).collect()
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = $1 ORDER BY message_order ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Message::try_from).collect()
    }

    async fn count_messages(&self, session_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the session serializes concurrent appends.
        sqlx::query("SELECT id FROM chat_sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;

        let current_max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(message_order) FROM chat_messages WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;
        let order = current_max.unwrap_or(0) + 1;

        let row: MessageRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO chat_messages (id, session_id, user_id, role, content, message_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(order)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE chat_sessions SET turn_count = $2 WHERE id = $1")
            .bind(session_id)
            .bind(order)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Message::try_from(row)
    }

    async fn complete_session(
        &self,
        session_id: Uuid,
        artifact: Option<&ExtractedArtifact>,
    ) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;

        // Conditional update is the idempotency guard: a second caller matches no row.
        let claimed: Option<(Uuid, Option<String>)> = sqlx::query_as(
            r#"
            UPDATE chat_sessions
            SET status = 'completed', ended_at = now(), artifact_generated = $2
            WHERE id = $1 AND status = 'active'
            RETURNING user_id, template
            "#,
        )
        .bind(session_id)
        .bind(artifact.is_some())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, template)) = claimed else {
            tx.rollback().await?;
            return Ok(Transition::AlreadyCompleted);
        };

        let artifact_id = match artifact {
            None => None,
            Some(ExtractedArtifact::Career(career)) => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO career_analyses
                        (id, session_id, user_id, analysis_json, analysis_markdown, roadmap_json)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(id)
                .bind(session_id)
                .bind(user_id)
                .bind(&career.analysis_json)
                .bind(&career.analysis_markdown)
                .bind(&career.roadmap_json)
                .execute(&mut *tx)
                .await?;
                Some(id)
            }
            Some(ExtractedArtifact::Resume(resume)) => {
                let id = Uuid::new_v4();
                let template = template
                    .as_deref()
                    .and_then(ResumeTemplate::parse)
                    .unwrap_or_default();
                sqlx::query(
                    r#"
                    INSERT INTO resumes (id, session_id, user_id, resume_json, template)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(id)
                .bind(session_id)
                .bind(user_id)
                .bind(&resume.resume_json)
                .bind(template.as_str())
                .execute(&mut *tx)
                .await?;
                Some(id)
            }
        };

        tx.commit().await?;
        info!("Session {session_id} completed (artifact: {artifact_id:?})");
        Ok(Transition::Completed { artifact_id })
    }

    async fn set_session_summary(&self, session_id: Uuid, summary: &str) -> Result<()> {
        sqlx::query("UPDATE chat_sessions SET session_summary = $2 WHERE id = $1")
            .bind(session_id)
            .bind(summary)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_career_analysis(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CareerAnalysis>> {
        let row: Option<CareerAnalysisRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, user_id, analysis_json, analysis_markdown, roadmap_json, created_at
            FROM career_analyses
            WHERE session_id = $1 AND user_id = $2
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CareerAnalysis::from))
    }

    async fn find_resume_by_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Resume>> {
        let row: Option<ResumeRow> = sqlx::query_as(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE session_id = $1 AND user_id = $2"
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Resume::from))
    }

    async fn find_resume(&self, resume_id: Uuid, user_id: Uuid) -> Result<Option<Resume>> {
        let row: Option<ResumeRow> = sqlx::query_as(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1 AND user_id = $2"
        ))
        .bind(resume_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Resume::from))
    }

    async fn update_resume_template(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        template: ResumeTemplate,
    ) -> Result<Option<Resume>> {
        let row: Option<ResumeRow> = sqlx::query_as(&format!(
            r#"
            UPDATE resumes SET template = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {RESUME_COLUMNS}
            "#
        ))
        .bind(resume_id)
        .bind(user_id)
        .bind(template.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Resume::from))
    }

    async fn find_context_summary(&self, user_id: Uuid) -> Result<Option<ContextSummary>> {
        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT cumulative_summary, last_updated_at FROM context_summaries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(cumulative_summary, last_updated_at)| ContextSummary {
            user_id,
            cumulative_summary,
            last_updated_at,
        }))
    }

    async fn save_context_summary(&self, user_id: Uuid, summary: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO context_summaries (id, user_id, cumulative_summary, last_updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id)
            DO UPDATE SET cumulative_summary = EXCLUDED.cumulative_summary, last_updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(summary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_student_context(&self, user_id: Uuid) -> Result<Option<StudentContext>> {
        let row: Option<StudentRow> = sqlx::query_as(
            r#"
            SELECT u.name, u.college, (p.id IS NOT NULL) AS has_profile,
                   p.education_level, p.class_or_year, p.board, p.stream, p.cgpa,
                   p.city, p.state, p.parent_occupation, p.income_range,
                   p.hobbies, p.interests, p.strengths, p.weaknesses, p.languages,
                   p.career_aspiration_raw
            FROM users u
            LEFT JOIN user_profiles p ON p.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StudentContext::from))
    }
}
