//! Shared types for the blob store client.

use reqwest::StatusCode;
use std::collections::BTreeMap;
use thiserror::Error;

/// User metadata stored alongside an object, keyed by lowercase name.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Errors returned while interacting with the blob store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid blob store URL: {0}")]
    InvalidUrl(String),
    /// Metadata entry could not be expressed as an HTTP header.
    #[error("Metadata entry '{0}' is not a valid header")]
    InvalidMetadata(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Blob store responded with an unexpected status code.
    #[error("Unexpected blob store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the blob store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}
