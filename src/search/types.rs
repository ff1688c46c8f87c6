//! Search records and error definitions.

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors returned while writing to the search index.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Host endpoint failed to parse or normalize.
    #[error("Invalid search host: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Search cluster responded with an unexpected status code.
    #[error("Unexpected search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the cluster.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Searchable document written for every labeled upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRecord {
    /// Owner of the uploaded image.
    pub user_id: String,
    /// Public URL of the stored image.
    pub img_s3_path: String,
    /// Key of the object inside the bucket.
    #[serde(rename = "objectKey")]
    pub object_key: String,
    /// Detected labels, lowercased.
    pub ai_labels: Vec<String>,
    /// Labels supplied by the uploader.
    pub custom_labels: Vec<String>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl LabelRecord {
    /// Build a record, normalizing detected labels to lowercase.
    pub fn new(
        user_id: &str,
        img_s3_path: String,
        object_key: &str,
        detected: &[String],
        custom_labels: Vec<String>,
        created_at: String,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            img_s3_path,
            object_key: object_key.to_string(),
            ai_labels: detected.iter().map(|label| label.to_lowercase()).collect(),
            custom_labels,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_with_index_field_names() {
        let record = LabelRecord::new(
            "u123",
            "https://imageinquiry-images.s3.amazonaws.com/u123/abc".into(),
            "u123/abc",
            &["Cat".to_string(), "Outdoor Plant".to_string()],
            vec!["dog".into()],
            "2025-01-01T00:00:00Z".into(),
        );

        let value = serde_json::to_value(&record).expect("serializable");
        assert_eq!(
            value,
            json!({
                "user_id": "u123",
                "img_s3_path": "https://imageinquiry-images.s3.amazonaws.com/u123/abc",
                "objectKey": "u123/abc",
                "ai_labels": ["cat", "outdoor plant"],
                "custom_labels": ["dog"],
                "created_at": "2025-01-01T00:00:00Z"
            })
        );
    }
}
