//! Context Summarizer: one rolling free-text digest per user.
//!
//! Updates are read-modify-write on a single row, so they are serialized per
//! user through an async mutex keyed by user id. Different users never share a lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::prompts::{COUNSELOR_LABEL, STUDENT_LABEL};
use crate::llm_client::{ChatTurn, Generator, LlmError};
use crate::models::session::{Message, Role};
use crate::store::SessionStore;

pub mod prompts;

/// Appended between consecutive session summaries.
pub const SUMMARY_SEPARATOR: &str = "\n\n---\n\n";
/// Word count above which the concatenation is condensed.
pub const CONDENSE_ABOVE_WORDS: usize = 1000;

pub struct ContextSummarizer {
    store: Arc<dyn SessionStore>,
    generator: Arc<dyn Generator>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ContextSummarizer {
    pub fn new(store: Arc<dyn SessionStore>, generator: Arc<dyn Generator>) -> Self {
        Self {
            store,
            generator,
            locks: DashMap::new(),
        }
    }

    /// Folds one session summary into the user's cumulative summary.
    ///
    /// A failed condensation keeps the uncondensed concatenation.
    pub async fn record_session_end(&self, user_id: Uuid, session_summary: &str) -> anyhow::Result<()> {
        let lock = self.locks.entry(user_id).or_default().clone();
        let _guard = lock.lock().await;

        let updated = match self.store.find_context_summary(user_id).await? {
            None => session_summary.to_string(),
            Some(existing) => {
                let joined = format!(
                    "{}{SUMMARY_SEPARATOR}{session_summary}",
                    existing.cumulative_summary
                );
                let word_count = count_words(&joined);
                if word_count > CONDENSE_ABOVE_WORDS {
                    match self.condense(&joined).await {
                        Ok(condensed) => {
                            info!(
                                "Condensed context summary for user {user_id} ({word_count} words -> {})",
                                count_words(&condensed)
                            );
                            condensed
                        }
                        Err(e) => {
                            warn!("Summary condensation failed for user {user_id}, keeping full text: {e}");
                            joined
                        }
                    }
                } else {
                    joined
                }
            }
        };

        self.store.save_context_summary(user_id, &updated).await
    }

    /// Single-shot 150-200 word summary of a finished conversation.
    pub async fn summarize_session(&self, messages: &[Message]) -> Result<String, LlmError> {
        let transcript = render_transcript(messages);
        let summary = self
            .generator
            .generate(prompts::SESSION_SUMMARY_SYSTEM, &[ChatTurn::user(transcript)])
            .await?;
        Ok(summary.trim().to_string())
    }

    async fn condense(&self, joined: &str) -> Result<String, LlmError> {
        let condensed = self
            .generator
            .generate(prompts::CONDENSE_SYSTEM, &[ChatTurn::user(joined)])
            .await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(condensed.to_string())
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => STUDENT_LABEL,
                Role::Assistant => COUNSELOR_LABEL,
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
