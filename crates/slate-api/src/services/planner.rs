//! LLM planner interface.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Generation and resilience settings shared by planner backends.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Deadline for one attempt
    pub timeout: Duration,
    /// Retries per model on transient errors
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.2,
            timeout: Duration::from_secs(90),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Self {
        fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            max_tokens: parse("PLANNER_MAX_TOKENS").unwrap_or(defaults.max_tokens),
            temperature: parse("PLANNER_TEMPERATURE").unwrap_or(defaults.temperature),
            timeout: parse("PLANNER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: parse("PLANNER_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_base_delay: parse("PLANNER_RETRY_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
        }
    }

    /// Backoff before retry `attempt` (1-based), doubling and capped at 30s.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base_delay
            .saturating_mul(factor)
            .min(Duration::from_secs(30))
    }
}

/// One text-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Errors raised by a planner backend.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Planner not configured: {0}")]
    NotConfigured(String),

    #[error("Planner request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Planner network error: {0}")]
    Network(String),

    #[error("Planner returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Planner returned no content")]
    EmptyResponse,

    #[error("Planner response was malformed: {0}")]
    InvalidResponse(String),

    #[error("All planner models failed: {0}")]
    Exhausted(Box<PlannerError>),
}

impl PlannerError {
    /// Worth retrying against the same model.
    pub fn is_transient(&self) -> bool {
        match self {
            PlannerError::Timeout(_) | PlannerError::Network(_) => true,
            PlannerError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Text generation backend used by the schedule builder.
///
/// The returned text is expected to contain one JSON value but nothing is
/// enforced here; callers validate it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulePlanner: Send + Sync {
    async fn plan(&self, request: PlannerRequest) -> Result<String, PlannerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = PlannerConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(500));
        assert_eq!(config.backoff(2), Duration::from_millis(1000));
        assert_eq!(config.backoff(3), Duration::from_millis(2000));
        assert_eq!(config.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn test_transient_errors() {
        assert!(PlannerError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(PlannerError::Network("reset".into()).is_transient());
        assert!(PlannerError::Http { status: 429, body: String::new() }.is_transient());
        assert!(PlannerError::Http { status: 503, body: String::new() }.is_transient());
        assert!(!PlannerError::Http { status: 400, body: String::new() }.is_transient());
        assert!(!PlannerError::EmptyResponse.is_transient());
        assert!(!PlannerError::NotConfigured("key".into()).is_transient());
    }
}
