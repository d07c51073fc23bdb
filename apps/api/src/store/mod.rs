//! Persistence collaborator for the session engine.
//!
//! Every read the engine exposes is scoped by the owning user. Writes that must
//! land together (message + turn counter, terminal transition + artifact) are
//! one transaction in the Postgres implementation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::extraction::ExtractedArtifact;
use crate::models::artifact::{CareerAnalysis, Resume, ResumeTemplate};
use crate::models::session::{Message, Role, Session, SessionKind};
use crate::models::summary::ContextSummary;
use crate::models::user::StudentContext;

pub mod postgres;

pub use postgres::PgSessionStore;

/// Outcome of a terminal-transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The session was already `completed`; nothing was written.
    AlreadyCompleted,
    /// This call performed the transition. `artifact_id` is set when an artifact row was created.
    Completed { artifact_id: Option<Uuid> },
}

/// Carried in `AppState` behind `Arc<dyn SessionStore>`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn count_active_sessions(&self, user_id: Uuid, kind: SessionKind) -> anyhow::Result<i64>;

    async fn insert_session(&self, session: &Session) -> anyhow::Result<()>;

    async fn find_session(&self, session_id: Uuid, user_id: Uuid)
        -> anyhow::Result<Option<Session>>;

    /// Newest first.
    async fn list_sessions(&self, user_id: Uuid, kind: SessionKind)
        -> anyhow::Result<Vec<Session>>;

    /// Ordered by `order` ascending.
    async fn list_messages(&self, session_id: Uuid) -> anyhow::Result<Vec<Message>>;

    async fn count_messages(&self, session_id: Uuid) -> anyhow::Result<i64>;

    /// Appends at `MAX(order) + 1` and sets the session's turn counter to that order.
    async fn append_message(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        role: Role,
        content: &str,
    ) -> anyhow::Result<Message>;

    /// Moves an `active` session to `completed`, stamps `ended_at` and records the
    /// artifact if one is given. A resume artifact copies the session's template.
    async fn complete_session(
        &self,
        session_id: Uuid,
        artifact: Option<&ExtractedArtifact>,
    ) -> anyhow::Result<Transition>;

    async fn set_session_summary(&self, session_id: Uuid, summary: &str) -> anyhow::Result<()>;

    async fn find_career_analysis(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<CareerAnalysis>>;

    async fn find_resume_by_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Resume>>;

    async fn find_resume(&self, resume_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Resume>>;

    /// Returns the updated resume, or `None` when the caller does not own it.
    async fn update_resume_template(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        template: ResumeTemplate,
    ) -> anyhow::Result<Option<Resume>>;

    async fn find_context_summary(&self, user_id: Uuid) -> anyhow::Result<Option<ContextSummary>>;

    /// Upsert of the user's single summary row.
    async fn save_context_summary(&self, user_id: Uuid, summary: &str) -> anyhow::Result<()>;

    async fn find_student_context(&self, user_id: Uuid) -> anyhow::Result<Option<StudentContext>>;
}
