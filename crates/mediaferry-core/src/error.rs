//! Error types module
//!
//! Each remote interaction has its own error enum so that callers can tell
//! retryable failures apart from terminal ones without string matching.
//! The pipeline never aborts on a per-item error; only `ImportError` is
//! surfaced as a run-wide failure.

use thiserror::Error;

/// Errors produced while opening a source content stream.
///
/// `Unreachable` covers transport failures and 5xx responses and is the only
/// variant the orchestrator retries. `Forbidden` and `NotFound` are terminal
/// for the item.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("source access forbidden: {0}")]
    Forbidden(String),

    #[error("source content not found: {0}")]
    NotFound(String),
}

impl FetchError {
    /// Whether the orchestrator may retry the fetch.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Unreachable(_))
    }
}

/// Errors produced by the staging call (first protocol phase).
#[derive(Debug, Error)]
pub enum StageError {
    /// Remote 5xx, timeout, or connection failure. Retryable with backoff.
    #[error("staging failed transiently: {0}")]
    Transient(String),

    /// Remote 4xx, e.g. unsupported content type. Terminal for the item.
    #[error("staging rejected (status {code:?}): {message}")]
    Rejected { code: Option<u16>, message: String },
}

/// Whole-batch errors from the commit call (second protocol phase).
///
/// A `Transient` error means no entry in the batch was created and the same
/// token list may be resubmitted. Per-item failures inside a successful
/// commit are *not* errors at this level; they arrive as failed
/// [`crate::models::CommitOutcome`] entries.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("commit failed transiently: {0}")]
    Transient(String),

    #[error("commit rejected (status {code:?}): {message}")]
    Rejected { code: Option<u16>, message: String },
}

/// Run-wide pipeline errors.
///
/// Per-item failures are reported in the [`crate::models::ImportReport`];
/// only configuration problems and internal task failures abort a run.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid import configuration: {0}")]
    InvalidConfig(String),

    #[error("pipeline task failed: {0}")]
    Internal(String),
}
