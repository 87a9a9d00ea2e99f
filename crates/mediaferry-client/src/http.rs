//! Reqwest-backed implementation of the remote protocol.
//!
//! `POST {base}/v1/uploads` stages raw bytes and answers with the opaque
//! upload token as a plain-text body. `POST {base}/v1/mediaItems:batchCreate`
//! creates records for a batch of tokens. Content fetching is a plain GET
//! against the item's locator, which may point at any host.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use mediaferry_core::{CommitBatch, CommitError, CommitOutcome, FetchError, StageError};

use crate::traits::{CommitClient, ContentFetcher, ContentStream, UploadStager};
use crate::wire::{BatchCreateRequest, BatchCreateResponse};

const STAGE_PATH: &str = "/v1/uploads";
const COMMIT_PATH: &str = "/v1/mediaItems:batchCreate";

/// Raw-upload protocol headers sent with each staging call.
const UPLOAD_FILE_NAME_HEADER: &str = "X-Goog-Upload-File-Name";
const UPLOAD_PROTOCOL_HEADER: &str = "X-Goog-Upload-Protocol";

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// HTTP client for the destination service, implementing all three remote
/// capabilities. Cloning is cheap; the underlying reqwest client is shared.
#[derive(Clone, Debug)]
pub struct RemoteMediaClient {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl RemoteMediaClient {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    /// Create a client from MEDIAFERRY_API_URL and MEDIAFERRY_API_TOKEN.
    pub fn from_env() -> Result<Self, reqwest::Error> {
        let base_url = std::env::var("MEDIAFERRY_API_URL")
            .unwrap_or_else(|_| "https://photoslibrary.googleapis.com".to_string());
        let token = std::env::var("MEDIAFERRY_API_TOKEN").unwrap_or_default();
        Self::new(base_url, token)
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.bearer_token))
    }
}

#[async_trait]
impl ContentFetcher for RemoteMediaClient {
    async fn fetch(&self, locator: &str) -> Result<ContentStream, FetchError> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Forbidden(format!(
                    "source returned {} for {}",
                    status, locator
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound(locator.to_string()));
            }
            s if !s.is_success() => {
                return Err(FetchError::Unreachable(format!(
                    "source returned {} for {}",
                    status, locator
                )));
            }
            _ => {}
        }

        tracing::debug!(locator = %locator, "Opened source content stream");
        let stream = response
            .bytes_stream()
            .map_err(|e| FetchError::Unreachable(e.to_string()));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl UploadStager for RemoteMediaClient {
    async fn stage(
        &self,
        stream: ContentStream,
        display_name: &str,
    ) -> Result<String, StageError> {
        let url = self.build_url(STAGE_PATH);
        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .header(UPLOAD_FILE_NAME_HEADER, display_name)
            .header(UPLOAD_PROTOCOL_HEADER, "raw")
            .body(reqwest::Body::wrap_stream(stream));

        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| StageError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StageError::Transient(format!(
                "staging endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StageError::Rejected {
                code: Some(status.as_u16()),
                message,
            });
        }

        let token = response
            .text()
            .await
            .map_err(|e| StageError::Transient(e.to_string()))?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(StageError::Rejected {
                code: None,
                message: "staging endpoint returned an empty upload token".to_string(),
            });
        }

        tracing::debug!(display_name = %display_name, "Staged content for upload token");
        Ok(token)
    }
}

#[async_trait]
impl CommitClient for RemoteMediaClient {
    async fn commit(&self, batch: &CommitBatch) -> Result<Vec<CommitOutcome>, CommitError> {
        let url = self.build_url(COMMIT_PATH);
        let request = self
            .client
            .post(&url)
            .json(&BatchCreateRequest::from_batch(batch));

        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| CommitError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CommitError::Transient(format!(
                "commit endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(CommitError::Rejected {
                code: Some(status.as_u16()),
                message,
            });
        }

        let body: BatchCreateResponse = response
            .json()
            .await
            .map_err(|e| CommitError::Rejected {
                code: None,
                message: format!("unparseable commit response: {}", e),
            })?;

        // The protocol correlates results to request entries by index, so a
        // count mismatch makes every entry unreconcilable.
        if body.new_media_item_results.len() != batch.len() {
            return Err(CommitError::Rejected {
                code: None,
                message: format!(
                    "commit response carried {} results for {} entries",
                    body.new_media_item_results.len(),
                    batch.len()
                ),
            });
        }

        tracing::debug!(entries = batch.len(), "Commit call succeeded");
        Ok(body
            .new_media_item_results
            .into_iter()
            .map(|r| r.into_outcome())
            .collect())
    }
}
