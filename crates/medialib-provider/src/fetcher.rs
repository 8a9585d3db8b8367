//! Remote metadata and thumbnail fetching.

use std::time::Duration;

use async_trait::async_trait;
use medialib_models::ProviderMetadata;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::metrics::record_fetch;

/// Fetches oEmbed documents and reference images.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch and parse a JSON metadata document.
    async fn fetch_metadata(&self, url: &str) -> ProviderResult<ProviderMetadata>;

    /// Download raw bytes (reference images).
    async fn fetch_bytes(&self, url: &str) -> ProviderResult<Vec<u8>>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Max retries on network errors
    pub max_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

impl FetcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(
                std::env::var("OEMBED_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("OEMBED_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(FetcherConfig::from_env())
    }

    async fn get(&self, url: &str) -> ProviderResult<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match self.http.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    return Err(ProviderError::fetch_failure(format!(
                        "{} returned {}",
                        url,
                        response.status()
                    )))
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(250 * 2u64.pow(attempt));
                    warn!(
                        "Fetch of {} failed (attempt {}), retrying in {:?}: {}",
                        url,
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_timeout() => {
                    return Err(ProviderError::fetch_failure(format!(
                        "{} timed out after {:?}",
                        url, self.config.timeout
                    )))
                }
                Err(e) => return Err(ProviderError::fetch_failure(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpFetcher {
    async fn fetch_metadata(&self, url: &str) -> ProviderResult<ProviderMetadata> {
        debug!("Fetching metadata from {}", url);

        let result: ProviderResult<ProviderMetadata> = async {
            let response = self.get(url).await?;
            let value: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ProviderError::fetch_failure(format!("invalid metadata: {}", e)))?;

            if !value.is_object() {
                return Err(ProviderError::fetch_failure("metadata is not a JSON object"));
            }
            Ok(ProviderMetadata::from_value(value))
        }
        .await;

        record_fetch("metadata", result.is_ok());
        result
    }

    async fn fetch_bytes(&self, url: &str) -> ProviderResult<Vec<u8>> {
        debug!("Downloading {}", url);

        let result: ProviderResult<Vec<u8>> = async {
            let response = self.get(url).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProviderError::fetch_failure(e.to_string()))?;
            Ok(bytes.to_vec())
        }
        .await;

        record_fetch("image", result.is_ok());
        result
    }
}
