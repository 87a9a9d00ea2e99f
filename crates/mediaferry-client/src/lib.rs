//! Remote protocol layer for Mediaferry.
//!
//! Defines the three capability traits the pipeline depends on
//! ([`ContentFetcher`], [`UploadStager`], [`CommitClient`]) and a
//! reqwest-backed implementation of the two-phase upload protocol
//! ([`RemoteMediaClient`]).

pub mod http;
pub mod traits;
mod wire;

pub use http::RemoteMediaClient;
pub use traits::{CommitClient, ContentFetcher, ContentStream, UploadStager};

use bytes::Bytes;
use futures::stream;
use mediaferry_core::FetchError;

/// Wrap fully materialized bytes as a [`ContentStream`]. Useful for tests
/// and for callers whose content is already in memory.
pub fn content_stream_from_bytes(data: impl Into<Bytes>) -> ContentStream {
    let bytes = data.into();
    Box::pin(stream::once(async move { Ok::<_, FetchError>(bytes) }))
}
