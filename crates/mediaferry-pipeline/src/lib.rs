//! Mediaferry import pipeline.
//!
//! The [`ImportOrchestrator`] pulls source items, drives fetch and stage
//! concurrently under a bounded worker pool, groups staged uploads into
//! commit batches, and reconciles per-entry outcomes back to source item
//! identity. See the crate-level types in `mediaferry-core` and the remote
//! traits in `mediaferry-client`.

pub mod orchestrator;

pub use orchestrator::ImportOrchestrator;

// Callers construct cancellation tokens from here without a direct
// tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
