//! Remote capability traits
//!
//! The pipeline is polymorphic over three narrow interfaces: fetching source
//! bytes, staging them for an upload token, and committing staged tokens in
//! batches. Tests substitute fake implementations returning canned outcomes;
//! production uses the reqwest-backed [`crate::RemoteMediaClient`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use mediaferry_core::{CommitBatch, CommitError, CommitOutcome, FetchError, StageError};

/// Incrementally consumable source content. The pipeline never buffers a
/// whole item in memory; chunks flow straight into the staging request body.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Produces a readable byte stream for a source locator.
///
/// Failures are not retried at this layer; that decision belongs to the
/// orchestrator.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<ContentStream, FetchError>;
}

/// Sends one item's bytes to the remote service and returns an opaque
/// upload token. Exactly one staging call per invocation; the stream is
/// consumed and cannot be reused.
#[async_trait]
pub trait UploadStager: Send + Sync {
    async fn stage(&self, stream: ContentStream, display_name: &str)
        -> Result<String, StageError>;
}

/// Issues one remote "create" call for a bounded batch of staged tokens.
///
/// On success the returned outcomes have the same length and order as the
/// batch entries (positional correlation — the wire protocol carries no
/// correlation IDs). A whole-batch error produces no outcomes at all.
#[async_trait]
pub trait CommitClient: Send + Sync {
    async fn commit(&self, batch: &CommitBatch) -> Result<Vec<CommitOutcome>, CommitError>;
}
