//! HTTP asset downloader.

use std::time::Duration;

use bytes::Bytes;

use super::{AssetDownloader, AssetError};
use crate::BoxFuture;

/// Default timeout for a single asset download.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 10;

/// Asset downloader backed by an async reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestDownloader {
    client: reqwest::Client,
}

impl ReqwestDownloader {
    /// Creates a downloader with the default timeout.
    pub fn new() -> Result<Self, AssetError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }

    /// Creates a downloader with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssetError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AssetDownloader for ReqwestDownloader {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await.map_err(|e| {
                if e.is_timeout() {
                    AssetError::Timeout(url.to_string())
                } else {
                    AssetError::Http(format!("Request failed: {}", e))
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(AssetError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .bytes()
                .await
                .map_err(|e| AssetError::Http(format!("Failed to read response: {}", e)))
        })
    }
}
