//! Request, outcome, and error types for the upload pipeline.

use crate::{
    labels::LabelError, multipart::MultipartError, search::SearchError, storage::StorageError,
};
use thiserror::Error;

/// One upload as received from the HTTP surface.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Value of the `Content-Type` header, carrying the multipart boundary.
    pub content_type: String,
    /// Base64-encoded multipart body.
    pub body_base64: String,
    /// Owner of the upload.
    pub user_id: String,
}

/// Result of a fully processed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Labels as returned by the detector, original casing preserved.
    pub labels: Vec<String>,
    /// Normalized labels supplied by the uploader.
    pub custom_labels: Vec<String>,
    /// Key under which the image was stored.
    pub object_key: String,
}

/// Coarse failure classes used to choose a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request did not have the expected multipart shape.
    MalformedRequest,
    /// A collaborator (blob store, label service, search index) failed.
    ServiceFailure,
    /// Anything else.
    UnexpectedFailure,
}

/// Errors emitted by the upload pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Multipart body could not be decoded.
    #[error("{0}")]
    Multipart(#[from] MultipartError),
    /// A required request header was absent or unreadable.
    #[error("missing header: {0}")]
    MissingHeader(String),
    /// A required request field was absent.
    #[error("missing request field: {0}")]
    MissingField(String),
    /// The request body could not be read.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    /// A form field held a value that cannot be stored.
    #[error("invalid value for field: {0}")]
    InvalidField(String),
    /// The form carried no file part, or an empty one.
    #[error("no file part was uploaded")]
    MissingFile,
    /// Storing the image failed.
    #[error("Failed to upload image: {0}")]
    Upload(#[source] StorageError),
    /// Reading the stored custom labels back failed.
    #[error("Failed to retrieve custom labels: {0}")]
    CustomLabels(#[source] StorageError),
    /// Label detection failed.
    #[error("Failed to detect labels: {0}")]
    Labels(#[from] LabelError),
    /// Writing the search record failed.
    #[error("Failed to index record: {0}")]
    Search(#[from] SearchError),
    /// The search record could not be serialized.
    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The record timestamp could not be formatted.
    #[error("Failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl PipelineError {
    /// Classify the error for status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Multipart(_)
            | Self::MissingHeader(_)
            | Self::MissingField(_)
            | Self::InvalidBody(_)
            | Self::InvalidField(_) => ErrorKind::MalformedRequest,
            Self::Upload(_) | Self::CustomLabels(_) | Self::Labels(_) | Self::Search(_) => {
                ErrorKind::ServiceFailure
            }
            Self::MissingFile | Self::Serialization(_) | Self::Timestamp(_) => {
                ErrorKind::UnexpectedFailure
            }
        }
    }

    /// Message returned to clients, prefixed by the failure class.
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::MalformedRequest => format!("Malformed request: {self}"),
            ErrorKind::ServiceFailure => format!("Service error: {self}"),
            ErrorKind::UnexpectedFailure => format!("An unexpected error occurred: {self}"),
        }
    }
}
