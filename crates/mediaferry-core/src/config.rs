//! Configuration module
//!
//! Configuration for the import pipeline: batch sizing, worker concurrency,
//! and the retry policies applied to stage and commit calls. Values can be
//! built directly or read from the environment.

use std::env;
use std::time::Duration;

use crate::error::ImportError;

const DEFAULT_BATCH_LIMIT: usize = 50;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_FLUSH_DEADLINE_MS: u64 = 2_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;

/// Capped exponential backoff policy for retryable remote failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Must be at least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt number `attempt` (0-based:
    /// attempt 0 is the first failure). Exponential with a cap.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32).max(1.0);
        // Compare in f64 seconds so a large factor saturates at the cap
        // instead of overflowing Duration arithmetic.
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Pipeline configuration handed to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// Protocol-imposed upper bound on entries per commit call.
    pub batch_limit: usize,
    /// Maximum number of items fetched and staged concurrently.
    pub concurrency: usize,
    /// A partially filled batch is dispatched once this long has elapsed
    /// since its first entry arrived.
    pub flush_deadline: Duration,
    /// Retry policy for fetch and stage calls (per item).
    pub stage_retry: RetryPolicy,
    /// Retry policy for whole-batch commit calls.
    pub commit_retry: RetryPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            flush_deadline: Duration::from_millis(DEFAULT_FLUSH_DEADLINE_MS),
            stage_retry: RetryPolicy::default(),
            commit_retry: RetryPolicy::default(),
        }
    }
}

impl ImportConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable:
    /// MEDIAFERRY_BATCH_LIMIT, MEDIAFERRY_CONCURRENCY,
    /// MEDIAFERRY_FLUSH_DEADLINE_MS, MEDIAFERRY_MAX_ATTEMPTS,
    /// MEDIAFERRY_INITIAL_BACKOFF_MS.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_attempts: parse_env("MEDIAFERRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            initial_backoff: Duration::from_millis(parse_env(
                "MEDIAFERRY_INITIAL_BACKOFF_MS",
                DEFAULT_INITIAL_BACKOFF_MS,
            )),
            ..RetryPolicy::default()
        };
        Self {
            batch_limit: parse_env("MEDIAFERRY_BATCH_LIMIT", defaults.batch_limit),
            concurrency: parse_env("MEDIAFERRY_CONCURRENCY", defaults.concurrency),
            flush_deadline: Duration::from_millis(parse_env(
                "MEDIAFERRY_FLUSH_DEADLINE_MS",
                DEFAULT_FLUSH_DEADLINE_MS,
            )),
            stage_retry: retry.clone(),
            commit_retry: retry,
        }
    }

    /// Validate before any item is processed. A bad configuration is the
    /// only pipeline-wide fatal error.
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.batch_limit == 0 {
            return Err(ImportError::InvalidConfig(
                "batch_limit must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ImportError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.stage_retry.max_attempts == 0 || self.commit_retry.max_attempts == 0 {
            return Err(ImportError::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
