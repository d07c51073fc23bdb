use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::artifact::ResumeTemplate;

/// Which counselor a session talks to. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Career,
    Resume,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Career => "career",
            SessionKind::Resume => "resume",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "career" => Some(SessionKind::Career),
            "resume" => Some(SessionKind::Resume),
            _ => None,
        }
    }

    pub fn default_title(&self) -> &'static str {
        match self {
            SessionKind::Career => "New Session",
            SessionKind::Resume => "New Resume",
        }
    }
}

/// Lifecycle state. `Active -> Completed` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: SessionKind,
    pub title: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Mirrors the order of the last persisted message.
    pub turn_count: i32,
    /// Career sessions only; written on the terminal transition.
    pub session_summary: Option<String>,
    pub artifact_generated: bool,
    /// Resume sessions only; copied onto the resume when it is produced.
    pub template: Option<ResumeTemplate>,
}

impl Session {
    pub fn new(
        user_id: Uuid,
        kind: SessionKind,
        title: String,
        template: Option<ResumeTemplate>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            turn_count: 0,
            session_summary: None,
            artifact_generated: false,
            template,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// One persisted chat turn. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub content: String,
    /// 1-based, contiguous within the session.
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_column_text() {
        for kind in [SessionKind::Career, SessionKind::Resume] {
            assert_eq!(SessionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SessionKind::parse("interview"), None);
    }

    #[test]
    fn test_new_session_starts_active_with_zero_turns() {
        let session = Session::new(
            Uuid::new_v4(),
            SessionKind::Career,
            "Exploring options".to_string(),
            None,
        );
        assert!(session.is_active());
        assert_eq!(session.turn_count, 0);
        assert!(session.ended_at.is_none());
        assert!(!session.artifact_generated);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(Role::parse("user"), Some(Role::User));
    }
}
