//! Labeling service coordinating the blob store, label detector, and search index.

use crate::{
    config::Config,
    labels::{HttpLabelDetector, LabelDetector},
    metrics::{MetricsSnapshot, UploadMetrics},
    multipart::decode_form,
    pipeline::types::{PipelineError, UploadOutcome, UploadRequest},
    search::{LabelRecord, OpenSearchIndex, SearchIndex},
    storage::{BlobStore, HttpBlobStore, ObjectMetadata},
};
use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Form field carrying the uploader's comma-separated labels.
pub const CUSTOM_LABELS_FIELD: &str = "customlabels";

/// Runs one upload end to end: decode the form, store the image, detect labels, read back the
/// custom labels, and index a searchable record.
///
/// Collaborators are injected so the HTTP surface and tests share the same orchestration. Build
/// the service once at startup and share it through an `Arc`.
pub struct LabelingService {
    config: Config,
    blob_store: Box<dyn BlobStore>,
    detector: Box<dyn LabelDetector>,
    search_index: Box<dyn SearchIndex>,
    metrics: Arc<UploadMetrics>,
}

/// Abstraction over the upload pipeline used by the HTTP surface.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Process one upload.
    async fn process_upload(&self, request: UploadRequest) -> Result<UploadOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl LabelingService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        config: Config,
        blob_store: Box<dyn BlobStore>,
        detector: Box<dyn LabelDetector>,
        search_index: Box<dyn SearchIndex>,
    ) -> Self {
        Self {
            config,
            blob_store,
            detector,
            search_index,
            metrics: Arc::new(UploadMetrics::new()),
        }
    }

    /// Build the HTTP-backed collaborators described by `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        tracing::info!("Initializing collaborator clients");
        let blob_store = HttpBlobStore::new(&config)?;
        let detector = HttpLabelDetector::new(&config)?;
        let search_index = OpenSearchIndex::new(&config)?;
        tracing::info!(
            bucket = %config.bucket_name,
            index = %config.index_name,
            "Collaborator clients initialized"
        );
        Ok(Self::new(
            config,
            Box::new(blob_store),
            Box::new(detector),
            Box::new(search_index),
        ))
    }

    /// Process one upload, recording the result in the metrics.
    pub async fn process_upload(
        &self,
        request: UploadRequest,
    ) -> Result<UploadOutcome, PipelineError> {
        match self.run(request).await {
            Ok(outcome) => {
                self.metrics.record_upload(outcome.labels.len() as u64);
                Ok(outcome)
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(kind = ?error.kind(), error = %error, "Upload failed");
                Err(error)
            }
        }
    }

    async fn run(&self, request: UploadRequest) -> Result<UploadOutcome, PipelineError> {
        let UploadRequest {
            content_type,
            body_base64,
            user_id,
        } = request;
        tracing::info!(content_type = %content_type, "Processing upload");

        let mut form = decode_form(&content_type, &body_base64)?;
        tracing::info!(fields = ?form.fields, "Parsed form fields");
        let image = form
            .file_payload
            .take()
            .filter(|bytes| !bytes.is_empty())
            .ok_or(PipelineError::MissingFile)?;
        let custom_labels_raw = form.field(CUSTOM_LABELS_FIELD).unwrap_or_default();
        // Metadata travels as header values, which cannot carry control characters.
        if custom_labels_raw
            .chars()
            .any(|ch| ch.is_control() && ch != '\t')
        {
            return Err(PipelineError::InvalidField(CUSTOM_LABELS_FIELD.into()));
        }

        let bucket = self.config.bucket_name.as_str();
        let object_key = format!("{user_id}/{}", Uuid::new_v4());
        let metadata = ObjectMetadata::from([(
            CUSTOM_LABELS_FIELD.to_string(),
            custom_labels_raw.to_string(),
        )]);
        self.blob_store
            .put(bucket, &object_key, image, &metadata)
            .await
            .map_err(PipelineError::Upload)?;
        tracing::info!(bucket, object_key = %object_key, "Image stored");

        let labels = self
            .detector
            .detect_labels(bucket, &object_key, self.config.label_min_confidence)
            .await?;
        tracing::info!(object_key = %object_key, labels = ?labels, "Labels detected");

        let stored = self
            .blob_store
            .get_metadata(bucket, &object_key)
            .await
            .map_err(PipelineError::CustomLabels)?;
        let custom_labels = stored
            .get(CUSTOM_LABELS_FIELD)
            .map(|raw| parse_custom_labels(raw))
            .unwrap_or_default();

        let record = LabelRecord::new(
            &user_id,
            self.config.object_url(&object_key),
            &object_key,
            &labels,
            custom_labels.clone(),
            current_timestamp_rfc3339()?,
        );
        tracing::debug!(record = ?record, "Record to index");
        let document = serde_json::to_value(&record)?;
        self.search_index
            .index_document(&self.config.index_name, &document)
            .await?;
        tracing::info!(
            index = %self.config.index_name,
            object_key = %object_key,
            ai_labels = record.ai_labels.len(),
            custom_labels = record.custom_labels.len(),
            "Record indexed"
        );

        Ok(UploadOutcome {
            labels,
            custom_labels,
            object_key,
        })
    }

    /// Return the current upload metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl PipelineApi for LabelingService {
    async fn process_upload(&self, request: UploadRequest) -> Result<UploadOutcome, PipelineError> {
        LabelingService::process_upload(self, request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        LabelingService::metrics_snapshot(self)
    }
}

/// Split a comma-separated label list, trimming, lowercasing, and dropping blanks and repeats.
pub fn parse_custom_labels(raw: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in raw.split(',').map(|label| label.trim().to_lowercase()) {
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

fn current_timestamp_rfc3339() -> Result<String, PipelineError> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|error| {
            tracing::warn!(error = %error, "Failed to format record timestamp");
            PipelineError::from(error)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelError;
    use crate::multipart::MultipartError;
    use crate::pipeline::types::ErrorKind;
    use crate::search::SearchError;
    use crate::storage::StorageError;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBlobStore {
        objects: Mutex<BTreeMap<String, (Vec<u8>, ObjectMetadata)>>,
        fail_put: bool,
    }

    #[async_trait]
    impl BlobStore for Arc<MemoryBlobStore> {
        async fn put(
            &self,
            bucket: &str,
            key: &str,
            bytes: Vec<u8>,
            metadata: &ObjectMetadata,
        ) -> Result<(), StorageError> {
            if self.fail_put {
                return Err(StorageError::InvalidMetadata("forced".into()));
            }
            self.objects
                .lock()
                .unwrap()
                .insert(format!("{bucket}/{key}"), (bytes, metadata.clone()));
            Ok(())
        }

        async fn get_metadata(
            &self,
            bucket: &str,
            key: &str,
        ) -> Result<ObjectMetadata, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(&format!("{bucket}/{key}"))
                .map(|(_, metadata)| metadata.clone())
                .ok_or_else(|| StorageError::InvalidUrl(format!("{bucket}/{key} not found")))
        }
    }

    struct FixedLabels(Vec<&'static str>);

    #[async_trait]
    impl LabelDetector for FixedLabels {
        async fn detect_labels(
            &self,
            _bucket: &str,
            _key: &str,
            min_confidence: f32,
        ) -> Result<Vec<String>, LabelError> {
            assert_eq!(min_confidence, 80.0);
            Ok(self.0.iter().map(|label| label.to_string()).collect())
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        documents: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl SearchIndex for Arc<RecordingIndex> {
        async fn index_document(
            &self,
            index: &str,
            document: &Value,
        ) -> Result<Option<String>, SearchError> {
            self.documents
                .lock()
                .unwrap()
                .push((index.to_string(), document.clone()));
            Ok(Some("doc-1".into()))
        }
    }

    fn test_config() -> Config {
        Config {
            bucket_name: "test-images".into(),
            blob_store_url: "http://127.0.0.1:9000".into(),
            label_service_url: "http://127.0.0.1:9001".into(),
            label_min_confidence: 80.0,
            search_host: "http://127.0.0.1:9200".into(),
            search_username: "admin".into(),
            search_password: "secret".into(),
            index_name: "photo-label".into(),
            default_user_id: "u123".into(),
            strict_status_codes: false,
            server_port: None,
            max_body_bytes: 1024 * 1024,
        }
    }

    fn multipart_body(custom_labels: Option<&str>, image: Option<&[u8]>) -> String {
        let mut body = Vec::new();
        if let Some(labels) = custom_labels {
            body.extend_from_slice(
                format!(
                    "--b0undary\r\nContent-Disposition: form-data; name=\"customlabels\"\r\n\r\n{labels}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = image {
            body.extend_from_slice(
                b"--b0undary\r\nContent-Disposition: form-data; name=\"image\"; filename=\"x.jpg\"\r\n\r\n",
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"--b0undary--\r\n");
        STANDARD.encode(body)
    }

    fn request(body_base64: String) -> UploadRequest {
        UploadRequest {
            content_type: "multipart/form-data; boundary=b0undary".into(),
            body_base64,
            user_id: "alice".into(),
        }
    }

    struct Harness {
        service: LabelingService,
        store: Arc<MemoryBlobStore>,
        index: Arc<RecordingIndex>,
    }

    fn harness(store: MemoryBlobStore) -> Harness {
        let store = Arc::new(store);
        let index = Arc::new(RecordingIndex::default());
        let service = LabelingService::new(
            test_config(),
            Box::new(store.clone()),
            Box::new(FixedLabels(vec!["Cat", "Pet"])),
            Box::new(index.clone()),
        );
        Harness {
            service,
            store,
            index,
        }
    }

    #[tokio::test]
    async fn stores_labels_and_indexes_record() {
        let Harness {
            service,
            store,
            index,
        } = harness(MemoryBlobStore::default());

        let outcome = service
            .process_upload(request(multipart_body(Some("Dog, cat,,dog"), Some(b"jpeg"))))
            .await
            .expect("upload succeeds");

        assert_eq!(outcome.labels, vec!["Cat".to_string(), "Pet".to_string()]);
        assert_eq!(outcome.custom_labels, vec!["dog".to_string(), "cat".to_string()]);
        assert!(outcome.object_key.starts_with("alice/"));

        let objects = store.objects.lock().unwrap();
        let (bytes, metadata) = &objects[&format!("test-images/{}", outcome.object_key)];
        assert_eq!(bytes, b"jpeg");
        assert_eq!(metadata["customlabels"], "Dog, cat,,dog");

        let documents = index.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        let (index_name, document) = &documents[0];
        assert_eq!(index_name, "photo-label");
        assert_eq!(document["user_id"], "alice");
        assert_eq!(document["objectKey"], outcome.object_key.as_str());
        assert_eq!(
            document["img_s3_path"],
            format!("https://test-images.s3.amazonaws.com/{}", outcome.object_key)
        );
        assert_eq!(document["ai_labels"], serde_json::json!(["cat", "pet"]));
        assert_eq!(document["custom_labels"], serde_json::json!(["dog", "cat"]));

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.uploads_processed, 1);
        assert_eq!(snapshot.labels_detected, 2);
    }

    #[tokio::test]
    async fn missing_custom_labels_store_empty_metadata() {
        let Harness { service, store, .. } = harness(MemoryBlobStore::default());

        let outcome = service
            .process_upload(request(multipart_body(None, Some(b"png"))))
            .await
            .expect("upload succeeds");

        assert!(outcome.custom_labels.is_empty());
        let objects = store.objects.lock().unwrap();
        let (_, metadata) = &objects[&format!("test-images/{}", outcome.object_key)];
        assert_eq!(metadata["customlabels"], "");
    }

    #[tokio::test]
    async fn upload_without_file_fails_before_storage() {
        let Harness {
            service,
            store,
            index,
        } = harness(MemoryBlobStore::default());

        let error = service
            .process_upload(request(multipart_body(Some("cat"), None)))
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::MissingFile));
        assert_eq!(error.kind(), ErrorKind::UnexpectedFailure);
        assert!(store.objects.lock().unwrap().is_empty());
        assert!(index.documents.lock().unwrap().is_empty());
        assert_eq!(service.metrics_snapshot().failures, 1);
    }

    #[tokio::test]
    async fn empty_file_part_counts_as_missing() {
        let Harness {
            service,
            store,
            index,
        } = harness(MemoryBlobStore::default());

        let error = service
            .process_upload(request(multipart_body(Some("cat"), Some(b""))))
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::MissingFile));
        assert!(store.objects.lock().unwrap().is_empty());
        assert!(index.documents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_labels_with_line_breaks_are_malformed() {
        let Harness { service, store, .. } = harness(MemoryBlobStore::default());

        let error = service
            .process_upload(request(multipart_body(Some("cat\r\nx-evil: 1"), Some(b"png"))))
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::InvalidField(ref field) if field == "customlabels"));
        assert_eq!(error.kind(), ErrorKind::MalformedRequest);
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[test]
    fn record_timestamp_is_rfc3339() {
        let stamp = current_timestamp_rfc3339().expect("timestamp");
        assert_eq!(stamp.as_bytes()[10], b'T');
        assert!(stamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn malformed_body_is_classified() {
        let Harness { service, .. } = harness(MemoryBlobStore::default());
        let mut upload = request(multipart_body(None, Some(b"x")));
        upload.content_type = "multipart/form-data".into();

        let error = service.process_upload(upload).await.unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Multipart(MultipartError::MissingBoundary)
        ));
        assert_eq!(error.kind(), ErrorKind::MalformedRequest);
    }

    #[tokio::test]
    async fn storage_failure_stops_the_pipeline() {
        let Harness { service, index, .. } = harness(MemoryBlobStore {
            fail_put: true,
            ..Default::default()
        });

        let error = service
            .process_upload(request(multipart_body(None, Some(b"x"))))
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::Upload(_)));
        assert_eq!(error.kind(), ErrorKind::ServiceFailure);
        assert!(index.documents.lock().unwrap().is_empty());
    }

    #[test]
    fn custom_labels_are_normalized() {
        assert_eq!(
            parse_custom_labels(" Beach ,SUNSET,, beach,  "),
            vec!["beach".to_string(), "sunset".to_string()]
        );
        assert!(parse_custom_labels("").is_empty());
    }
}
