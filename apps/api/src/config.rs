use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::session::SessionKind;

/// Per-kind ceilings that drive the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimits {
    /// Max concurrently `active` sessions a user may hold for this kind.
    pub max_active_sessions: i64,
    /// Max persisted messages (user + assistant) in one session.
    pub max_messages: i64,
    /// Assistant turns after which the forced-finalization directive is sent.
    pub force_artifact_after: usize,
}

impl SessionLimits {
    pub const CAREER: SessionLimits = SessionLimits {
        max_active_sessions: 5,
        max_messages: 30,
        force_artifact_after: 15,
    };

    pub const RESUME: SessionLimits = SessionLimits {
        max_active_sessions: 10,
        max_messages: 25,
        force_artifact_after: 12,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitsByKind {
    pub career: SessionLimits,
    pub resume: SessionLimits,
}

impl LimitsByKind {
    pub fn for_kind(&self, kind: SessionKind) -> &SessionLimits {
        match kind {
            SessionKind::Career => &self.career,
            SessionKind::Resume => &self.resume,
        }
    }
}

impl Default for LimitsByKind {
    fn default() -> Self {
        Self {
            career: SessionLimits::CAREER,
            resume: SessionLimits::RESUME,
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Upper bound on one streamed generation; exceeding it is a stream failure.
    pub generation_timeout: Duration,
    pub limits: LimitsByKind,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = LimitsByKind::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            generation_timeout: Duration::from_secs(env_or("GENERATION_TIMEOUT_SECS", 120)?),
            limits: LimitsByKind {
                career: SessionLimits {
                    max_active_sessions: env_or(
                        "CAREER_MAX_ACTIVE_SESSIONS",
                        defaults.career.max_active_sessions,
                    )?,
                    max_messages: env_or("CAREER_MAX_MESSAGES", defaults.career.max_messages)?,
                    force_artifact_after: env_or(
                        "CAREER_FORCE_ARTIFACT_AFTER",
                        defaults.career.force_artifact_after,
                    )?,
                },
                resume: SessionLimits {
                    max_active_sessions: env_or(
                        "RESUME_MAX_ACTIVE_SESSIONS",
                        defaults.resume.max_active_sessions,
                    )?,
                    max_messages: env_or("RESUME_MAX_MESSAGES", defaults.resume.max_messages)?,
                    force_artifact_after: env_or(
                        "RESUME_FORCE_ARTIFACT_AFTER",
                        defaults.resume.force_artifact_after,
                    )?,
                },
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_match_kind_ceilings() {
        let limits = LimitsByKind::default();
        assert_eq!(limits.for_kind(SessionKind::Career).max_active_sessions, 5);
        assert_eq!(limits.for_kind(SessionKind::Career).max_messages, 30);
        assert_eq!(limits.for_kind(SessionKind::Career).force_artifact_after, 15);
        assert_eq!(limits.for_kind(SessionKind::Resume).max_active_sessions, 10);
        assert_eq!(limits.for_kind(SessionKind::Resume).max_messages, 25);
        assert_eq!(limits.for_kind(SessionKind::Resume).force_artifact_after, 12);
    }

    #[test]
    fn test_env_or_falls_back_when_unset() {
        let value: u64 = env_or("COUNSEL_TEST_SURELY_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
