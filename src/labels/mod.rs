//! Label detection for stored images.

use crate::config::Config;
use crate::endpoint::normalize_base_url;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DETECT_LABELS_TARGET: &str = "RekognitionService.DetectLabels";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Errors raised by label detection backends.
#[derive(Debug, Error)]
pub enum LabelError {
    /// Endpoint failed to parse or normalize.
    #[error("Invalid label service URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Label service responded with an unexpected status code.
    #[error("Unexpected label service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the label service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Interface implemented by label detection backends.
#[async_trait]
pub trait LabelDetector: Send + Sync {
    /// Return the names of labels detected in `bucket/key` at or above `min_confidence`.
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        min_confidence: f32,
    ) -> Result<Vec<String>, LabelError>;
}

/// Label detector calling a Rekognition-style JSON endpoint.
pub struct HttpLabelDetector {
    pub(crate) client: Client,
    pub(crate) endpoint: String,
}

impl HttpLabelDetector {
    /// Construct a detector for the configured endpoint.
    pub fn new(config: &Config) -> Result<Self, LabelError> {
        let client = Client::builder().user_agent("imageinquiry/0.1").build()?;
        let endpoint =
            normalize_base_url(&config.label_service_url).map_err(LabelError::InvalidUrl)?;
        tracing::debug!(url = %endpoint, "Initialized label detection client");
        Ok(Self { client, endpoint })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectLabelsResponse {
    #[serde(default)]
    labels: Vec<DetectedLabel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectedLabel {
    name: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[async_trait]
impl LabelDetector for HttpLabelDetector {
    async fn detect_labels(
        &self,
        bucket: &str,
        key: &str,
        min_confidence: f32,
    ) -> Result<Vec<String>, LabelError> {
        let body = json!({
            "Image": { "S3Object": { "Bucket": bucket, "Name": key } },
            "MinConfidence": min_confidence,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", DETECT_LABELS_TARGET)
            .header(CONTENT_TYPE, AMZ_JSON)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LabelError::UnexpectedStatus { status, body };
            tracing::error!(bucket, key, error = %error, "Label detection failed");
            return Err(error);
        }

        let payload: DetectLabelsResponse = response.json().await?;
        for label in &payload.labels {
            tracing::trace!(name = %label.name, confidence = ?label.confidence, "Label detected");
        }
        Ok(payload.labels.into_iter().map(|label| label.name).collect())
    }
}
