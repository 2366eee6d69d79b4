//! HTTP client for fetching remote images

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::DownloadsConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status: HTTP {0}")]
    Status(u16),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: format!("herald/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&DownloadsConfig> for HttpConfig {
    fn from(config: &DownloadsConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Single-attempt image fetcher; retries are the caller's business
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self { client })
    }

    /// GET `url` once. Anything but `200 OK` is a failure.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        debug!(url, "Fetching");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else if e.is_builder() {
                FetchError::InvalidUrl(url.to_string())
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        debug!(url, size = bytes.len(), "Fetch completed");

        Ok(bytes)
    }
}
