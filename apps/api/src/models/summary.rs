use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The rolling per-user digest of completed career sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub user_id: Uuid,
    pub cumulative_summary: String,
    pub last_updated_at: DateTime<Utc>,
}
