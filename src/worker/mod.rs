//! Download worker
//!
//! The download actor runs a [`runner::DownloadProcessor`]: it fetches
//! every file of a batch over HTTP under a [`retry::RetryPolicy`], uploads
//! it to media storage and reports progress.

pub mod http;
pub mod retry;
pub mod runner;

use async_trait::async_trait;
use bytes::Bytes;

pub use http::{FetchError, HttpConfig, HttpFetcher};
pub use retry::{Attempted, RetryPolicy};
pub use runner::{DownloadProcessor, TaskError};

/// One fetch attempt for a remote file
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> http::Result<Bytes>;
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> http::Result<Bytes> {
        HttpFetcher::fetch(self, url).await
    }
}
