//! Retrieval of input documents.
//!
//! The conversion core treats input fetching as a plain byte-fetch
//! collaborator behind [`DocumentFetcher`], so tests can substitute canned
//! bytes without touching the network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::warn;

use crate::convert::ConvertError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Retrieve the document bytes behind `input_ref`.
    async fn fetch(&self, input_ref: &str) -> Result<Bytes, ConvertError>;
}

/// Fetches documents over HTTP(S).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build fetch HTTP client: {}", e);
                Client::new()
            });
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, input_ref: &str) -> Result<Bytes, ConvertError> {
        // Fail fast on refs that cannot resolve to bytes instead of
        // spending a conversion slot on them.
        if !input_ref.starts_with("http://") && !input_ref.starts_with("https://") {
            return Err(ConvertError::download(format!(
                "unsupported input reference: {input_ref}"
            )));
        }

        let response = self
            .client
            .get(input_ref)
            .send()
            .await
            .map_err(|e| ConvertError::download(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConvertError::download(format!(
                "{input_ref} returned {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| ConvertError::download(format!("failed to read body: {e}")))
    }
}
