//! Mediaferry Core Library
//!
//! This crate provides the domain models, error taxonomy, and configuration
//! shared across all Mediaferry components. It has no I/O of its own; the
//! client and pipeline crates build on these types.

pub mod config;
pub mod error;
pub mod models;
pub mod naming;

// Re-export commonly used types
pub use config::{ImportConfig, RetryPolicy};
pub use error::{CommitError, FetchError, ImportError, StageError};
pub use models::{
    CommitBatch, CommitOutcome, FailureReason, ImportDisposition, ImportReport, SourceMediaItem,
    StagedUpload,
};
pub use naming::derive_display_name;
