use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Career counseling output. At least one of `analysis_json` / `analysis_markdown` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerAnalysis {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub analysis_json: Option<Value>,
    pub analysis_markdown: Option<String>,
    pub roadmap_json: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub resume_json: Value,
    pub template: ResumeTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rendering template for a resume. Selected at session creation, changeable afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTemplate {
    #[default]
    Professional,
    Modern,
    Simple,
    Rendercv,
    Sidebar,
    Jake,
}

impl ResumeTemplate {
    pub const ALL: [ResumeTemplate; 6] = [
        ResumeTemplate::Professional,
        ResumeTemplate::Modern,
        ResumeTemplate::Simple,
        ResumeTemplate::Rendercv,
        ResumeTemplate::Sidebar,
        ResumeTemplate::Jake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeTemplate::Professional => "professional",
            ResumeTemplate::Modern => "modern",
            ResumeTemplate::Simple => "simple",
            ResumeTemplate::Rendercv => "rendercv",
            ResumeTemplate::Sidebar => "sidebar",
            ResumeTemplate::Jake => "jake",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}
