//! HTTP client for an S3-compatible blob store using path-style addressing.

use crate::config::Config;
use crate::endpoint::{format_endpoint, normalize_base_url};
use crate::storage::types::{ObjectMetadata, StorageError};
use async_trait::async_trait;
use reqwest::{
    Client, Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};

const METADATA_PREFIX: &str = "x-amz-meta-";

/// Interface implemented by blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `bucket/key` together with user metadata.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError>;

    /// Read back the user metadata of a stored object.
    async fn get_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError>;
}

/// Blob store client speaking the S3 REST object API.
pub struct HttpBlobStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl HttpBlobStore {
    /// Construct a client for the configured blob store endpoint.
    pub fn new(config: &Config) -> Result<Self, StorageError> {
        let client = Client::builder().user_agent("imageinquiry/0.1").build()?;
        let base_url =
            normalize_base_url(&config.blob_store_url).map_err(StorageError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized blob store HTTP client");
        Ok(Self { client, base_url })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format_endpoint(&self.base_url, &format!("{bucket}/{key}"))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), StorageError> {
        let headers = metadata_headers(metadata)?;
        let size = bytes.len();
        let response = self
            .client
            .request(Method::PUT, self.object_url(bucket, key))
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(bucket, key, bytes = size, "Object stored");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StorageError::UnexpectedStatus { status, body };
            tracing::error!(bucket, key, error = %error, "Failed to store object");
            Err(error)
        }
    }

    async fn get_metadata(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let response = self
            .client
            .request(Method::HEAD, self.object_url(bucket, key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = StorageError::UnexpectedStatus {
                status,
                body: String::new(),
            };
            tracing::error!(bucket, key, error = %error, "Failed to read object metadata");
            return Err(error);
        }

        Ok(metadata_from_headers(response.headers()))
    }
}

fn metadata_headers(metadata: &ObjectMetadata) -> Result<HeaderMap, StorageError> {
    let mut headers = HeaderMap::new();
    for (key, value) in metadata {
        let name = HeaderName::from_bytes(format!("{METADATA_PREFIX}{key}").as_bytes())
            .map_err(|_| StorageError::InvalidMetadata(key.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| StorageError::InvalidMetadata(key.clone()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn metadata_from_headers(headers: &HeaderMap) -> ObjectMetadata {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(METADATA_PREFIX)?;
            // Header values are opaque bytes; UTF-8 written on put must read back intact.
            let value = std::str::from_utf8(value.as_bytes()).ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
