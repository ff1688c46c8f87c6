//! HTTP client for an OpenSearch-compatible document index.

use crate::config::Config;
use crate::endpoint::{format_endpoint, normalize_base_url};
use crate::search::types::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Interface implemented by search index backends.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Write a JSON document into `index`, returning the id assigned by the backend if any.
    async fn index_document(
        &self,
        index: &str,
        document: &Value,
    ) -> Result<Option<String>, SearchError>;
}

/// Basic-auth client for the OpenSearch document API.
pub struct OpenSearchIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) username: String,
    pub(crate) password: String,
}

impl OpenSearchIndex {
    /// Construct a client for the configured search host.
    pub fn new(config: &Config) -> Result<Self, SearchError> {
        let client = Client::builder().user_agent("imageinquiry/0.1").build()?;
        let base_url = normalize_base_url(&config.search_host).map_err(SearchError::InvalidUrl)?;
        tracing::debug!(url = %base_url, user = %config.search_username, "Initialized search client");
        Ok(Self {
            client,
            base_url,
            username: config.search_username.clone(),
            password: config.search_password.clone(),
        })
    }
}

#[derive(Deserialize)]
struct IndexResponse {
    #[serde(default, rename = "_id")]
    id: Option<String>,
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    async fn index_document(
        &self,
        index: &str,
        document: &Value,
    ) -> Result<Option<String>, SearchError> {
        let response = self
            .client
            .post(format_endpoint(&self.base_url, &format!("{index}/_doc")))
            .basic_auth(&self.username, Some(&self.password))
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = SearchError::UnexpectedStatus { status, body };
            tracing::error!(index, error = %error, "Failed to index document");
            return Err(error);
        }

        // The status already confirmed the write; the acknowledgement body is optional.
        let id = response
            .json::<IndexResponse>()
            .await
            .ok()
            .and_then(|ack| ack.id);
        tracing::debug!(index, id = ?id, "Document indexed");
        Ok(id)
    }
}
