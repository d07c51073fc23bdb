//! Session State Machine: `active -> completed`, one-way.
//!
//! Owns session and message lifecycle: quotas, turn ordering, the forced
//! finalization threshold and both terminal transitions. Streaming lives in
//! `crate::streaming`; this module only decides what gets persisted and when.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LimitsByKind;
use crate::errors::AppError;
use crate::extraction::ExtractedArtifact;
use crate::llm_client::ChatTurn;
use crate::models::artifact::{CareerAnalysis, Resume, ResumeTemplate};
use crate::models::session::{Message, Role, Session, SessionKind};
use crate::sessions::prompts::{build_instructions, InstructionInputs};
use crate::store::{SessionStore, Transition};
use crate::summarizer::ContextSummarizer;

pub const MAX_TITLE_CHARS: usize = 200;

/// Everything the streaming side needs for one generation. The inbound user
/// message is already committed when this exists.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    pub session: Session,
    pub user_message: Message,
    /// Full history in order, ending with `user_message`.
    pub turns: Vec<ChatTurn>,
    pub instructions: String,
    pub force_artifact: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub messages: Vec<Message>,
}

pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    summarizer: Arc<ContextSummarizer>,
    limits: LimitsByKind,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        summarizer: Arc<ContextSummarizer>,
        limits: LimitsByKind,
    ) -> Self {
        Self {
            store,
            summarizer,
            limits,
        }
    }

    pub async fn create_session(
        &self,
        user_id: Uuid,
        kind: SessionKind,
        title: Option<&str>,
        template: Option<ResumeTemplate>,
    ) -> Result<Session, AppError> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) if t.chars().count() > MAX_TITLE_CHARS => {
                return Err(AppError::Validation(format!(
                    "Title must be at most {MAX_TITLE_CHARS} characters"
                )))
            }
            Some(t) => t.to_string(),
            None => kind.default_title().to_string(),
        };

        let limit = self.limits.for_kind(kind).max_active_sessions;
        let active = self.store.count_active_sessions(user_id, kind).await?;
        if active >= limit {
            return Err(AppError::QuotaExceeded {
                limit,
                message: format!("Maximum {limit} active {} sessions allowed.", kind.as_str()),
            });
        }

        let template = match kind {
            SessionKind::Resume => Some(template.unwrap_or_default()),
            SessionKind::Career => None,
        };
        let session = Session::new(user_id, kind, title, template);
        self.store.insert_session(&session).await?;

        info!(
            "Created {} session {} for user {user_id}",
            kind.as_str(),
            session.id
        );
        Ok(session)
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        kind: SessionKind,
    ) -> Result<Vec<Session>, AppError> {
        Ok(self.store.list_sessions(user_id, kind).await?)
    }

    pub async fn session_detail(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<SessionDetail, AppError> {
        let session = self.owned_session(user_id, session_id).await?;
        let messages = self.store.list_messages(session.id).await?;
        Ok(SessionDetail { session, messages })
    }

    /// Validates the turn, commits the user message and prepares the generation.
    ///
    /// Checks run in order: ownership, lifecycle state, message ceiling.
    pub async fn post_message(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        content: &str,
    ) -> Result<TurnHandle, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let session = self.owned_session(user_id, session_id).await?;
        if !session.is_active() {
            return Err(AppError::InvalidState(
                "Session is no longer active".to_string(),
            ));
        }

        let limits = self.limits.for_kind(session.kind);
        let count = self.store.count_messages(session.id).await?;
        if count >= limits.max_messages {
            return Err(AppError::QuotaExceeded {
                limit: limits.max_messages,
                message: format!(
                    "Maximum {} messages per session reached.",
                    limits.max_messages
                ),
            });
        }

        let user_message = self
            .store
            .append_message(session.id, user_id, Role::User, content)
            .await?;

        let history = self.store.list_messages(session.id).await?;
        let assistant_turns = history
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        let force_artifact = assistant_turns >= limits.force_artifact_after;
        if force_artifact {
            info!(
                "Session {} reached {assistant_turns} assistant turns, requesting the artifact",
                session.id
            );
        }

        let student = self.store.find_student_context(user_id).await?;
        let previous_sessions = match session.kind {
            SessionKind::Career => self
                .store
                .find_context_summary(user_id)
                .await?
                .map(|s| s.cumulative_summary),
            SessionKind::Resume => None,
        };
        let instructions = build_instructions(&InstructionInputs {
            kind: session.kind,
            student: student.as_ref(),
            previous_sessions: previous_sessions.as_deref(),
            force_artifact,
        });

        Ok(TurnHandle {
            session: Session {
                turn_count: user_message.order,
                ..session
            },
            user_message,
            turns: history.into_iter().map(ChatTurn::from).collect(),
            instructions,
            force_artifact,
        })
    }

    /// Persists the accumulated reply as the next assistant message.
    pub async fn record_reply(&self, session: &Session, text: &str) -> anyhow::Result<Message> {
        self.store
            .append_message(session.id, session.user_id, Role::Assistant, text)
            .await
    }

    /// Terminal transition driven by an extracted artifact. A second call is a no-op.
    ///
    /// Career sessions then get their summary and feed the rolling context summary;
    /// failures there are logged and do not undo the transition.
    pub async fn complete_from_artifact(
        &self,
        session: &Session,
        artifact: &ExtractedArtifact,
    ) -> anyhow::Result<Transition> {
        let transition = self.store.complete_session(session.id, Some(artifact)).await?;
        match transition {
            Transition::AlreadyCompleted => {
                info!("Session {} already completed, ignoring artifact", session.id);
            }
            Transition::Completed { artifact_id } => {
                info!(
                    "Session {} completed from artifact {artifact_id:?}",
                    session.id
                );
                if session.kind == SessionKind::Career {
                    self.summarize_into_context(session).await;
                }
            }
        }
        Ok(transition)
    }

    /// User-initiated terminal transition without an artifact.
    pub async fn end_explicitly(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Session, AppError> {
        let session = self.owned_session(user_id, session_id).await?;
        if !session.is_active() {
            return Err(AppError::InvalidState(
                "Session is already ended".to_string(),
            ));
        }

        if session.kind == SessionKind::Career {
            self.summarize_into_context(&session).await;
        }

        match self.store.complete_session(session.id, None).await? {
            Transition::AlreadyCompleted => {
                return Err(AppError::InvalidState(
                    "Session is already ended".to_string(),
                ))
            }
            Transition::Completed { .. } => {
                info!("Session {} ended by user {user_id}", session.id)
            }
        }

        self.owned_session(user_id, session_id).await
    }

    pub async fn career_analysis(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<CareerAnalysis, AppError> {
        self.store
            .find_career_analysis(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Analysis not found for this session".to_string()))
    }

    pub async fn resume_for_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Resume, AppError> {
        self.store
            .find_resume_by_session(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Resume not found for this session".to_string()))
    }

    pub async fn resume(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume, AppError> {
        self.store
            .find_resume(resume_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
    }

    pub async fn update_resume_template(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        template: &str,
    ) -> Result<Resume, AppError> {
        let template = ResumeTemplate::parse(template).ok_or_else(|| {
            let known: Vec<&str> = ResumeTemplate::ALL.iter().map(|t| t.as_str()).collect();
            AppError::Validation(format!(
                "Unknown template '{template}'. Expected one of: {}",
                known.join(", ")
            ))
        })?;
        self.store
            .update_resume_template(resume_id, user_id, template)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
    }

    async fn owned_session(&self, user_id: Uuid, session_id: Uuid) -> Result<Session, AppError> {
        self.store
            .find_session(session_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
    }

    /// Best effort: a failed summary leaves `session_summary` unset.
    async fn summarize_into_context(&self, session: &Session) {
        let messages = match self.store.list_messages(session.id).await {
            Ok(messages) if !messages.is_empty() => messages,
            Ok(_) => return,
            Err(e) => {
                warn!("Could not load messages to summarize session {}: {e:?}", session.id);
                return;
            }
        };

        let summary = match self.summarizer.summarize_session(&messages).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Session summary generation failed for {}: {e}", session.id);
                return;
            }
        };

        if let Err(e) = self.store.set_session_summary(session.id, &summary).await {
            warn!("Could not store summary for session {}: {e:?}", session.id);
        }
        if let Err(e) = self
            .summarizer
            .record_session_end(session.user_id, &summary)
            .await
        {
            warn!(
                "Context summary update failed for user {}: {e:?}",
                session.user_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionLimits;
    use crate::extraction::{CareerExtract, ResumeExtract};
    use crate::models::session::SessionStatus;
    use crate::testing::{MemoryStore, ScriptedGenerator};
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryStore>,
        generator: Arc<ScriptedGenerator>,
        engine: SessionEngine,
        user: Uuid,
    }

    fn harness_with(limits: LimitsByKind) -> Harness {
        let store = MemoryStore::new();
        let generator = ScriptedGenerator::new();
        let summarizer = Arc::new(ContextSummarizer::new(store.clone(), generator.clone()));
        let engine = SessionEngine::new(store.clone(), summarizer, limits);
        Harness {
            store,
            generator,
            engine,
            user: Uuid::new_v4(),
        }
    }

    fn harness() -> Harness {
        harness_with(LimitsByKind::default())
    }

    fn career_artifact() -> ExtractedArtifact {
        ExtractedArtifact::Career(CareerExtract {
            analysis_json: Some(json!({"top_careers": []})),
            analysis_markdown: Some("## Your Career Analysis".to_string()),
            roadmap_json: None,
        })
    }

    #[tokio::test]
    async fn test_create_uses_default_title_and_template() {
        let h = harness();
        let career = h
            .engine
            .create_session(h.user, SessionKind::Career, Some("   "), None)
            .await
            .unwrap();
        assert_eq!(career.title, "New Session");
        assert_eq!(career.template, None);

        let resume = h
            .engine
            .create_session(h.user, SessionKind::Resume, None, None)
            .await
            .unwrap();
        assert_eq!(resume.title, "New Resume");
        assert_eq!(resume.template, Some(ResumeTemplate::Professional));
    }

    #[tokio::test]
    async fn test_overlong_title_is_rejected() {
        let h = harness();
        let title = "x".repeat(MAX_TITLE_CHARS + 1);
        let err = h
            .engine
            .create_session(h.user, SessionKind::Career, Some(&title), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_active_session_quota_is_per_kind() {
        let h = harness();
        for _ in 0..5 {
            h.engine
                .create_session(h.user, SessionKind::Career, None, None)
                .await
                .unwrap();
        }
        let err = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { limit: 5, .. }));

        h.engine
            .create_session(h.user, SessionKind::Resume, None, None)
            .await
            .expect("resume quota is separate");
    }

    #[tokio::test]
    async fn test_completed_sessions_free_the_quota() {
        let h = harness();
        let mut last = None;
        for _ in 0..5 {
            last = Some(
                h.engine
                    .create_session(h.user, SessionKind::Career, None, None)
                    .await
                    .unwrap(),
            );
        }
        h.engine
            .end_explicitly(h.user, last.unwrap().id)
            .await
            .unwrap();
        h.engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_post_message_commits_user_turn_first() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let turn = h
            .engine
            .post_message(h.user, session.id, "I like maths")
            .await
            .unwrap();

        assert_eq!(turn.user_message.order, 1);
        assert_eq!(turn.session.turn_count, 1);
        assert_eq!(h.store.session(session.id).turn_count, 1);
        assert_eq!(turn.turns, vec![ChatTurn::user("I like maths")]);
        assert!(!turn.force_artifact);
    }

    #[tokio::test]
    async fn test_post_message_to_foreign_session_is_not_found() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let err = h
            .engine
            .post_message(Uuid::new_v4(), session.id, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(h.store.messages(session.id).is_empty());
    }

    #[tokio::test]
    async fn test_post_message_to_completed_session_is_invalid_state() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Resume, None, None)
            .await
            .unwrap();
        h.engine.end_explicitly(h.user, session.id).await.unwrap();

        let err = h
            .engine
            .post_message(h.user, session.id, "one more thing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(h.store.messages(session.id).is_empty());
    }

    #[tokio::test]
    async fn test_message_ceiling_reports_limit() {
        let mut limits = LimitsByKind::default();
        limits.resume = SessionLimits {
            max_messages: 2,
            ..SessionLimits::RESUME
        };
        let h = harness_with(limits);
        let session = h
            .engine
            .create_session(h.user, SessionKind::Resume, None, None)
            .await
            .unwrap();
        let turn = h.engine.post_message(h.user, session.id, "hi").await.unwrap();
        h.engine.record_reply(&turn.session, "hello").await.unwrap();

        let err = h
            .engine
            .post_message(h.user, session.id, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { limit: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let err = h
            .engine
            .post_message(h.user, session.id, "  \n ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_career_instructions_carry_previous_sessions() {
        let h = harness();
        h.store.seed_summary(h.user, "Wants to study architecture.");
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let turn = h.engine.post_message(h.user, session.id, "hi").await.unwrap();
        assert!(turn.instructions.contains("Wants to study architecture."));
    }

    #[tokio::test]
    async fn test_force_threshold_counts_assistant_turns_only() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Resume, None, None)
            .await
            .unwrap();
        // 12 user turns with only 11 replies stays below the resume threshold of 12
        for i in 0..11 {
            let turn = h
                .engine
                .post_message(h.user, session.id, &format!("answer {i}"))
                .await
                .unwrap();
            assert!(!turn.force_artifact);
            h.engine.record_reply(&turn.session, "next question?").await.unwrap();
        }
        let turn = h.engine.post_message(h.user, session.id, "answer 11").await.unwrap();
        assert!(!turn.force_artifact);
        h.engine.record_reply(&turn.session, "next question?").await.unwrap();

        let turn = h.engine.post_message(h.user, session.id, "answer 12").await.unwrap();
        assert!(turn.force_artifact);
        assert!(turn.instructions.contains("IMPORTANT INSTRUCTION"));
    }

    #[tokio::test]
    async fn test_complete_from_artifact_twice_has_no_second_effect() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let turn = h.engine.post_message(h.user, session.id, "hi").await.unwrap();
        h.engine.record_reply(&turn.session, "analysis").await.unwrap();
        h.generator.push_reply("The student is curious.");

        let first = h
            .engine
            .complete_from_artifact(&turn.session, &career_artifact())
            .await
            .unwrap();
        assert!(matches!(
            first,
            Transition::Completed {
                artifact_id: Some(_)
            }
        ));
        let after_first = h.store.session(session.id);

        let second = h
            .engine
            .complete_from_artifact(&turn.session, &career_artifact())
            .await
            .unwrap();
        assert_eq!(second, Transition::AlreadyCompleted);

        let after_second = h.store.session(session.id);
        assert_eq!(after_second.status, SessionStatus::Completed);
        assert_eq!(after_second.ended_at, after_first.ended_at);
        assert_eq!(h.store.analysis_count(session.id), 1);
        // summary generated once
        assert_eq!(h.generator.generate_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_career_completion_feeds_context_summary() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let turn = h.engine.post_message(h.user, session.id, "hi").await.unwrap();
        h.engine.record_reply(&turn.session, "analysis").await.unwrap();
        h.generator.push_reply("The student enjoys design.");

        h.engine
            .complete_from_artifact(&turn.session, &career_artifact())
            .await
            .unwrap();

        let stored = h.store.session(session.id);
        assert!(stored.artifact_generated);
        assert_eq!(
            stored.session_summary.as_deref(),
            Some("The student enjoys design.")
        );
        assert_eq!(
            h.store.summary_text(h.user).as_deref(),
            Some("The student enjoys design.")
        );
        assert!(h.engine.career_analysis(h.user, session.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_resume_completion_copies_template_and_skips_summary() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Resume, None, Some(ResumeTemplate::Jake))
            .await
            .unwrap();
        let artifact = ExtractedArtifact::Resume(ResumeExtract {
            resume_json: json!({"personal_info": {"name": "Asha"}, "education": []}),
        });
        h.engine
            .complete_from_artifact(&session, &artifact)
            .await
            .unwrap();

        let resume = h.engine.resume_for_session(h.user, session.id).await.unwrap();
        assert_eq!(resume.template, ResumeTemplate::Jake);
        assert!(h.generator.generate_calls().is_empty());
        assert!(h.store.summary_text(h.user).is_none());
    }

    #[tokio::test]
    async fn test_end_explicitly_summarizes_then_completes() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        let turn = h.engine.post_message(h.user, session.id, "hi").await.unwrap();
        h.engine.record_reply(&turn.session, "hello!").await.unwrap();
        h.generator.push_reply("A short chat.");

        let ended = h.engine.end_explicitly(h.user, session.id).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.ended_at.is_some());
        assert!(!ended.artifact_generated);
        assert_eq!(ended.session_summary.as_deref(), Some("A short chat."));
        assert_eq!(h.store.summary_text(h.user).as_deref(), Some("A short chat."));

        let err = h.engine.end_explicitly(h.user, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_end_explicitly_survives_summary_failure() {
        let h = harness();
        let session = h
            .engine
            .create_session(h.user, SessionKind::Career, None, None)
            .await
            .unwrap();
        h.engine.post_message(h.user, session.id, "hi").await.unwrap();
        h.generator.push_failure();

        let ended = h.engine.end_explicitly(h.user, session.id).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.session_summary.is_none());
        assert!(h.store.summary_text(h.user).is_none());
    }

    #[tokio::test]
    async fn test_unknown_template_is_a_validation_error() {
        let h = harness();
        let err = h
            .engine
            .update_resume_template(h.user, Uuid::new_v4(), "fancy")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = h
            .engine
            .update_resume_template(h.user, Uuid::new_v4(), "modern")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
