//! Domain models for the two-phase import pipeline.
//!
//! The flow is: [`SourceMediaItem`] → [`StagedUpload`] → [`CommitBatch`] →
//! [`CommitOutcome`] → [`ImportDisposition`]. The orchestrator exclusively
//! owns the in-flight association between an item and its staged upload;
//! nothing here holds cross-references.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable descriptor of one media item to transfer.
///
/// Owned by the caller and read-only to the pipeline. `id` is the
/// source-native identity every report entry is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMediaItem {
    pub id: String,
    pub title: String,
    /// URI naming where the bytes are currently retrievable.
    pub locator: String,
    /// Declared MIME type, e.g. `video/mp4`.
    pub content_type: String,
    pub description: Option<String>,
}

impl SourceMediaItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        locator: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            locator: locator.into(),
            content_type: content_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A source item's identity paired with the opaque upload token obtained
/// from the staging call, plus the metadata needed at commit time.
///
/// A token is valid for exactly one future commit call; the orchestrator
/// discards the staged upload once its batch has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub source_id: String,
    pub upload_token: String,
    pub display_name: String,
    pub description: Option<String>,
}

/// An ordered sequence of staged uploads submitted in one commit call.
///
/// Order is preserved end-to-end: the remote protocol correlates results
/// positionally, so entry `i` of the request matches outcome `i` of the
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    entries: Vec<StagedUpload>,
}

impl CommitBatch {
    pub fn new(entries: Vec<StagedUpload>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[StagedUpload] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<StagedUpload> {
        self.entries
    }
}

/// Per-entry result of a successful commit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitOutcome {
    /// The remote service created a record and assigned it an identifier.
    Created { remote_id: String },
    /// This entry failed while sibling entries may have succeeded.
    Failed { code: Option<i32>, message: String },
}

/// Structured reason a source item did not import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Retries were exhausted on a retryable error.
    Transient { message: String, attempts: u32 },
    /// The remote service rejected the item or its batch outright.
    Rejected { code: Option<i32>, message: String },
    /// The item failed inside a commit whose sibling entries succeeded.
    PartialBatchFailure { code: Option<i32>, message: String },
}

/// Final per-item state in the import report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportDisposition {
    Imported { remote_id: String },
    Failed { reason: FailureReason },
    /// The run was cancelled before this item (or its batch) was started.
    NotAttempted,
}

impl ImportDisposition {
    pub fn is_imported(&self) -> bool {
        matches!(self, ImportDisposition::Imported { .. })
    }

    pub fn remote_id(&self) -> Option<&str> {
        match self {
            ImportDisposition::Imported { remote_id } => Some(remote_id),
            _ => None,
        }
    }
}

/// Mapping from source identity to final disposition; the pipeline's
/// externally visible output.
///
/// The orchestrator guarantees exactly one entry per input item. Recording
/// the same identity twice is a pipeline bug; `record` keeps the first
/// entry so the invariant is observable in tests rather than silently
/// overwritten.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    entries: HashMap<String, ImportDisposition>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a disposition for a source identity. Returns false if the
    /// identity was already present (the existing entry is kept).
    pub fn record(&mut self, source_id: impl Into<String>, disposition: ImportDisposition) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry(source_id.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(disposition);
                true
            }
        }
    }

    pub fn get(&self, source_id: &str) -> Option<&ImportDisposition> {
        self.entries.get(source_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ImportDisposition)> {
        self.entries.iter()
    }

    pub fn imported_count(&self) -> usize {
        self.entries.values().filter(|d| d.is_imported()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|d| matches!(d, ImportDisposition::Failed { .. }))
            .count()
    }

    pub fn into_inner(self) -> HashMap<String, ImportDisposition> {
        self.entries
    }
}
