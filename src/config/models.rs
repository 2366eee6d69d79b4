use super::size::ByteSize;
use crate::queue::OrderingPolicy;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration, shared by both services
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Loaded from the environment only, never from TOML
    #[serde(skip)]
    pub secrets: Secrets,
}

/// Downloads service HTTP settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default)]
    pub api: ApiLimits,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_max_urls_per_batch")]
    pub max_urls_per_batch: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ledger_path: default_ledger_path(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_urls_per_batch: default_max_urls_per_batch(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(5 * 1024 * 1024)
}

fn default_max_urls_per_batch() -> usize {
    1000
}

/// Download actor settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Total attempts per file, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_listener_write_timeout_ms")]
    pub listener_write_timeout_ms: u64,
    #[serde(default)]
    pub ordering: OrderingPolicy,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            listener_write_timeout_ms: default_listener_write_timeout_ms(),
            ordering: OrderingPolicy::default(),
        }
    }
}

fn default_user_agent() -> String {
    format!("herald/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_listener_write_timeout_ms() -> u64 {
    5000
}

/// Events service settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default = "default_events_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_listener_write_timeout_ms")]
    pub listener_write_timeout_ms: u64,
    #[serde(default)]
    pub ordering: OrderingPolicy,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_events_bind_addr(),
            listener_write_timeout_ms: default_listener_write_timeout_ms(),
            ordering: OrderingPolicy::default(),
        }
    }
}

fn default_events_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8081))
}

/// Media storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Directory for the local provider
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/medias")
}

/// Shared secrets, read from `JWT_SECRET` and `DOMAIN_SECRET`
#[derive(Clone, Default)]
pub struct Secrets {
    /// Signs platform event payloads and private event reads
    pub jwt_secret: Option<String>,
    /// Signs cluster tokens on download batches
    pub domain_secret: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |s: &Option<String>| s.as_ref().map(|_| "***");
        f.debug_struct("Secrets")
            .field("jwt_secret", &mask(&self.jwt_secret))
            .field("domain_secret", &mask(&self.domain_secret))
            .finish()
    }
}
