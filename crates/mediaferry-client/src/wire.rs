//! Wire types for the two-phase upload protocol.
//!
//! The commit call is JSON: an array of `{simpleMediaItem: {uploadToken},
//! displayName, description?}` entries, answered by an array of
//! `{mediaItem: {id}} | {status: {code, message}}` results correlated to the
//! request array by index. These shapes are an external contract; do not
//! reorder or re-key them.

use serde::{Deserialize, Serialize};

use mediaferry_core::{CommitBatch, CommitOutcome, StagedUpload};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchCreateRequest {
    pub new_media_items: Vec<NewMediaItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewMediaItem {
    pub simple_media_item: SimpleMediaItem,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimpleMediaItem {
    pub upload_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchCreateResponse {
    pub new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewMediaItemResult {
    pub media_item: Option<MediaItem>,
    pub status: Option<Status>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaItem {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    pub code: Option<i32>,
    pub message: Option<String>,
}

impl BatchCreateRequest {
    pub fn from_batch(batch: &CommitBatch) -> Self {
        Self {
            new_media_items: batch.entries().iter().map(NewMediaItem::from_staged).collect(),
        }
    }
}

impl NewMediaItem {
    fn from_staged(staged: &StagedUpload) -> Self {
        Self {
            simple_media_item: SimpleMediaItem {
                upload_token: staged.upload_token.clone(),
            },
            display_name: staged.display_name.clone(),
            description: staged.description.clone(),
        }
    }
}

impl NewMediaItemResult {
    /// Positional result entry → per-item outcome. An entry with neither a
    /// media item nor a status violates the protocol and counts as failed.
    pub fn into_outcome(self) -> CommitOutcome {
        if let Some(media_item) = self.media_item {
            return CommitOutcome::Created {
                remote_id: media_item.id,
            };
        }
        match self.status {
            Some(status) => CommitOutcome::Failed {
                code: status.code,
                message: status
                    .message
                    .unwrap_or_else(|| "remote error without message".to_string()),
            },
            None => CommitOutcome::Failed {
                code: None,
                message: "malformed result entry: no media item and no status".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(token: &str, name: &str, description: Option<&str>) -> StagedUpload {
        StagedUpload {
            source_id: "src".to_string(),
            upload_token: token.to_string(),
            display_name: name.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn request_serializes_to_protocol_shape() {
        let batch = CommitBatch::new(vec![staged(
            "uploadToken",
            "Copy of Model video title",
            Some("Model video description"),
        )]);
        let value = serde_json::to_value(BatchCreateRequest::from_batch(&batch)).unwrap();
        assert_eq!(
            value["newMediaItems"][0]["simpleMediaItem"]["uploadToken"],
            "uploadToken"
        );
        assert_eq!(
            value["newMediaItems"][0]["displayName"],
            "Copy of Model video title"
        );
        assert_eq!(
            value["newMediaItems"][0]["description"],
            "Model video description"
        );
    }

    #[test]
    fn missing_description_is_omitted() {
        let batch = CommitBatch::new(vec![staged("t", "n", None)]);
        let value = serde_json::to_value(BatchCreateRequest::from_batch(&batch)).unwrap();
        assert!(value["newMediaItems"][0].get("description").is_none());
    }

    #[test]
    fn success_result_becomes_created() {
        let raw = r#"{"mediaItem": {"id": "RESULT_ID"}}"#;
        let result: NewMediaItemResult = serde_json::from_str(raw).unwrap();
        assert_eq!(
            result.into_outcome(),
            CommitOutcome::Created {
                remote_id: "RESULT_ID".to_string()
            }
        );
    }

    #[test]
    fn status_result_becomes_failed() {
        let raw = r#"{"status": {"code": 8, "message": "quota exhausted"}}"#;
        let result: NewMediaItemResult = serde_json::from_str(raw).unwrap();
        assert_eq!(
            result.into_outcome(),
            CommitOutcome::Failed {
                code: Some(8),
                message: "quota exhausted".to_string()
            }
        );
    }

    #[test]
    fn empty_result_entry_is_failed_not_panic() {
        let result: NewMediaItemResult = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            result.into_outcome(),
            CommitOutcome::Failed { code: None, .. }
        ));
    }
}
