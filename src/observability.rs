//! Tracing setup and in-process counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "herald=info,tower_http=info";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    downloads_accepted: AtomicU64,
    downloads_recorded: AtomicU64,
    files_downloaded: AtomicU64,
    files_failed: AtomicU64,
    events_admitted: AtomicU64,
    events_rejected: AtomicU64,
    events_announced: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_accepted(&self) {
        Self::bump(&self.downloads_accepted, "downloads_accepted");
    }

    pub fn download_recorded(&self) {
        Self::bump(&self.downloads_recorded, "downloads_recorded");
    }

    pub fn file_downloaded(&self) {
        Self::bump(&self.files_downloaded, "files_downloaded");
    }

    pub fn file_failed(&self) {
        Self::bump(&self.files_failed, "files_failed");
    }

    pub fn event_admitted(&self) {
        Self::bump(&self.events_admitted, "events_admitted");
    }

    pub fn event_rejected(&self) {
        Self::bump(&self.events_rejected, "events_rejected");
    }

    pub fn event_announced(&self) {
        Self::bump(&self.events_announced, "events_announced");
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = name, "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            downloads_accepted: self.downloads_accepted.load(Ordering::Relaxed),
            downloads_recorded: self.downloads_recorded.load(Ordering::Relaxed),
            files_downloaded: self.files_downloaded.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            events_admitted: self.events_admitted.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            events_announced: self.events_announced.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub downloads_accepted: u64,
    pub downloads_recorded: u64,
    pub files_downloaded: u64,
    pub files_failed: u64,
    pub events_admitted: u64,
    pub events_rejected: u64,
    pub events_announced: u64,
}
