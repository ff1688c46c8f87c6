//! Upload pipeline: decode, store, label, and index.

mod service;
pub mod types;

pub use service::{LabelingService, PipelineApi, parse_custom_labels};
pub use types::{ErrorKind, PipelineError, UploadOutcome, UploadRequest};
