//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;
use uuid::Uuid;

use crate::extraction::ExtractedArtifact;
use crate::llm_client::{ChatTurn, FragmentStream, Generator, LlmError};
use crate::models::artifact::{CareerAnalysis, Resume, ResumeTemplate};
use crate::models::session::{Message, Role, Session, SessionKind, SessionStatus};
use crate::models::summary::ContextSummary;
use crate::models::user::StudentContext;
use crate::store::{SessionStore, Transition};

// ────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    messages: Vec<Message>,
    analyses: Vec<CareerAnalysis>,
    resumes: Vec<Resume>,
    summaries: HashMap<Uuid, ContextSummary>,
    students: HashMap<Uuid, StudentContext>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_assistant_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_student(&self, user_id: Uuid, student: StudentContext) {
        self.tables.lock().unwrap().students.insert(user_id, student);
    }

    /// Makes every following assistant append fail, as a dropped connection would.
    pub fn fail_assistant_appends(&self, fail: bool) {
        self.fail_assistant_appends.store(fail, Ordering::SeqCst);
    }

    pub fn session(&self, session_id: Uuid) -> Session {
        self.tables.lock().unwrap().sessions[&session_id].clone()
    }

    pub fn messages(&self, session_id: Uuid) -> Vec<Message> {
        self.tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn orders(&self, session_id: Uuid) -> Vec<i32> {
        self.messages(session_id).iter().map(|m| m.order).collect()
    }

    pub fn analysis_count(&self, session_id: Uuid) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.analyses.iter().filter(|a| a.session_id == session_id).count()
            + tables.resumes.iter().filter(|r| r.session_id == session_id).count()
    }

    pub fn summary_text(&self, user_id: Uuid) -> Option<String> {
        self.tables
            .lock()
            .unwrap()
            .summaries
            .get(&user_id)
            .map(|s| s.cumulative_summary.clone())
    }

    pub fn seed_summary(&self, user_id: Uuid, text: &str) {
        self.tables.lock().unwrap().summaries.insert(
            user_id,
            ContextSummary {
                user_id,
                cumulative_summary: text.to_string(),
                last_updated_at: Utc::now(),
            },
        );
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn count_active_sessions(&self, user_id: Uuid, kind: SessionKind) -> Result<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.kind == kind && s.is_active())
            .count() as i64)
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.tables
            .lock()
            .unwrap()
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Option<Session>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn list_sessions(&self, user_id: Uuid, kind: SessionKind) -> Result<Vec<Session>> {
        let tables = self.tables.lock().unwrap();
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.kind == kind)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>> {
        let mut messages = self.messages(session_id);
        messages.sort_by_key(|m| m.order);
        Ok(messages)
    }

    async fn count_messages(&self, session_id: Uuid) -> Result<i64> {
        Ok(self.messages(session_id).len() as i64)
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        if role == Role::Assistant && self.fail_assistant_appends.load(Ordering::SeqCst) {
            return Err(anyhow!("connection reset while appending"));
        }
        let mut tables = self.tables.lock().unwrap();
        let order = tables
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .map(|m| m.order)
            .max()
            .unwrap_or(0)
            + 1;
        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            role,
            content: content.to_string(),
            order,
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| anyhow!("no session {session_id}"))?;
        session.turn_count = order;
        Ok(message)
    }

    async fn complete_session(
        &self,
        session_id: Uuid,
        artifact: Option<&ExtractedArtifact>,
    ) -> Result<Transition> {
        let mut tables = self.tables.lock().unwrap();
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| anyhow!("no session {session_id}"))?;
        if !session.is_active() {
            return Ok(Transition::AlreadyCompleted);
        }
        session.status = SessionStatus::Completed;
        session.ended_at = Some(Utc::now());
        session.artifact_generated = artifact.is_some();
        let user_id = session.user_id;
        let template = session.template.unwrap_or_default();

        let artifact_id = artifact.map(|artifact| {
            let id = Uuid::new_v4();
            let now = Utc::now();
            match artifact {
                ExtractedArtifact::Career(career) => tables.analyses.push(CareerAnalysis {
                    id,
                    session_id,
                    user_id,
                    analysis_json: career.analysis_json.clone(),
                    analysis_markdown: career.analysis_markdown.clone(),
                    roadmap_json: career.roadmap_json.clone(),
                    created_at: now,
                }),
                ExtractedArtifact::Resume(resume) => tables.resumes.push(Resume {
                    id,
                    session_id,
                    user_id,
                    resume_json: resume.resume_json.clone(),
                    template,
                    created_at: now,
                    updated_at: now,
                }),
            }
            id
        });
        Ok(Transition::Completed { artifact_id })
    }

    async fn set_session_summary(&self, session_id: Uuid, summary: &str) -> Result<()> {
        if let Some(session) = self.tables.lock().unwrap().sessions.get_mut(&session_id) {
            session.session_summary = Some(summary.to_string());
        }
        Ok(())
    }

    async fn find_career_analysis(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CareerAnalysis>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .analyses
            .iter()
            .find(|a| a.session_id == session_id && a.user_id == user_id)
            .cloned())
    }

    async fn find_resume_by_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Resume>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .resumes
            .iter()
            .find(|r| r.session_id == session_id && r.user_id == user_id)
            .cloned())
    }

    async fn find_resume(&self, resume_id: Uuid, user_id: Uuid) -> Result<Option<Resume>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .resumes
            .iter()
            .find(|r| r.id == resume_id && r.user_id == user_id)
            .cloned())
    }

    async fn update_resume_template(
        &self,
        resume_id: Uuid,
        user_id: Uuid,
        template: ResumeTemplate,
    ) -> Result<Option<Resume>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .resumes
            .iter_mut()
            .find(|r| r.id == resume_id && r.user_id == user_id)
            .map(|r| {
                r.template = template;
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn find_context_summary(&self, user_id: Uuid) -> Result<Option<ContextSummary>> {
        Ok(self.tables.lock().unwrap().summaries.get(&user_id).cloned())
    }

    async fn save_context_summary(&self, user_id: Uuid, summary: &str) -> Result<()> {
        self.seed_summary(user_id, summary);
        Ok(())
    }

    async fn find_student_context(&self, user_id: Uuid) -> Result<Option<StudentContext>> {
        Ok(self.tables.lock().unwrap().students.get(&user_id).cloned())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedGenerator
// ────────────────────────────────────────────────────────────────────────────

/// How one `stream_generate` call behaves.
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Yields every fragment, then ends cleanly.
    Complete(Vec<String>),
    /// Yields the fragments, then an `Err` item.
    FailAfter(Vec<String>),
    /// Fails before any fragment.
    FailToOpen,
    /// Yields the fragments, then never ends.
    Hang(Vec<String>),
}

impl StreamScript {
    pub fn reply(text: &str) -> Self {
        StreamScript::Complete(vec![text.to_string()])
    }

    pub fn fragments(parts: &[&str]) -> Self {
        StreamScript::Complete(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// Replays queued scripts and records every set of instructions it was given.
/// Empty queues fall back to a short clean reply and a failing single-shot call.
#[derive(Default)]
pub struct ScriptedGenerator {
    streams: Mutex<VecDeque<StreamScript>>,
    replies: Mutex<VecDeque<Result<String, String>>>,
    stream_instructions: Mutex<Vec<String>>,
    generate_calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().unwrap().push_back(script);
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err("upstream unavailable".to_string()));
    }

    pub fn stream_instructions(&self) -> Vec<String> {
        self.stream_instructions.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> Vec<(String, Vec<ChatTurn>)> {
        self.generate_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn stream_generate(
        &self,
        instructions: &str,
        _turns: &[ChatTurn],
    ) -> Result<FragmentStream, LlmError> {
        self.stream_instructions
            .lock()
            .unwrap()
            .push(instructions.to_string());
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StreamScript::reply("Tell me more."));

        let stream: FragmentStream = match script {
            StreamScript::Complete(parts) => Box::pin(stream::iter(parts.into_iter().map(Ok))),
            StreamScript::FailAfter(parts) => Box::pin(stream::iter(
                parts
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(LlmError::Stream(
                        "overloaded".to_string(),
                    )))),
            )),
            StreamScript::FailToOpen => {
                return Err(LlmError::Api {
                    status: 529,
                    message: "overloaded".to_string(),
                })
            }
            StreamScript::Hang(parts) => {
                use futures_util::StreamExt;
                Box::pin(stream::iter(parts.into_iter().map(Ok)).chain(stream::pending()))
            }
        };
        Ok(stream)
    }

    async fn generate(&self, instructions: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
        self.generate_calls
            .lock()
            .unwrap()
            .push((instructions.to_string(), turns.to_vec()));
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LlmError::Api {
                status: 500,
                message,
            }),
            None => Err(LlmError::EmptyContent),
        }
    }
}

/// Words repeated until `count` is reached, for summary-size tests.
pub fn words(count: usize) -> String {
    vec!["word"; count].join(" ")
}
