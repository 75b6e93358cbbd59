use std::time::Duration;

use async_trait::async_trait;

/// Fetches a remote OpenAPI document by URL. Abstracted so tests can feed
/// canned documents without a network.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("request failed: {0}")]
    Transport(String),
}

/// reqwest-backed fetcher used in production.
pub struct HttpSchemaFetcher {
    client: reqwest::Client,
}

impl HttpSchemaFetcher {
    pub fn new() -> Self {
        let timeout = crate::config::config().import.fetch_timeout_secs;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpSchemaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemaFetcher for HttpSchemaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
