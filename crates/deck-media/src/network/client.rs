//! HTTP media source.
//!
//! Plain unauthenticated GET requests; any non-2xx status is a failure.

use crate::config::NetworkConfig;
use crate::error::{MediaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Somewhere missing media files can be fetched from.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch the full body at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`MediaSource`] backed by a reqwest client.
pub struct HttpMediaSource {
    client: Client,
}

impl HttpMediaSource {
    /// Create a source with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a source with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| MediaError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Network {
                message: format!("GET {} failed: {}", url, e),
                cause: Some(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::DownloadFailed {
                url: url.to_string(),
                message: format!("HTTP status {}", status),
            });
        }

        let body = response.bytes().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
