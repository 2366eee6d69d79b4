//! Request and response bodies of the downloads and events services
//!
//! Submitting a batch (`POST /downloads/batch`):
//!
//! ```json
//! {
//!   "cluster_token": "<HS256 JWT signed with DOMAIN_SECRET>",
//!   "category_id": "c7f3a1",
//!   "urls": ["https://cdn.example.com/1.jpg", "https://cdn.example.com/2.jpg"],
//!   "download_uuid": "optional, reuse to resume a previous batch"
//! }
//! ```
//!
//! Platform events (`POST /platform-events`) are sent as
//! [`PlatformEvent`](crate::events::PlatformEvent) bodies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::events::EventClass;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Deserialize, Clone)]
pub struct BatchRequest {
    pub cluster_token: String,
    pub category_id: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub download_uuid: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchAccepted {
    pub download_uuid: String,
    pub queued_files: usize,
}

/// Empty `download_uuid` when the actor is idle
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CurrentDownload {
    pub download_uuid: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DownloadHistory {
    pub exists: bool,
    pub download_count: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct DownloadQuery {
    #[serde(default)]
    pub download_uuid: Option<String>,
}

impl DownloadQuery {
    pub fn download_uuid(&self) -> Option<&str> {
        self.download_uuid.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub uuid: String,
    pub class: EventClass,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub metrics: MetricsSnapshot,
    pub version: String,
}
