use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::downloads::DownloadManager;
use crate::events::{EventCrier, EventIngest, EventStore};
use crate::ledger::FjallStore;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct DownloadsState {
    pub config: Arc<Config>,
    pub manager: Arc<DownloadManager>,
    pub ledger: Arc<FjallStore>,
    /// Verifies cluster tokens (`DOMAIN_SECRET`)
    pub cluster_tokens: Arc<TokenVerifier>,
    pub metrics: Arc<Metrics>,
}

#[derive(Clone)]
pub struct EventsState {
    pub config: Arc<Config>,
    pub ingest: Arc<EventIngest>,
    pub store: Arc<dyn EventStore>,
    pub crier: Arc<EventCrier>,
    /// Verifies bearer tokens on private reads (`JWT_SECRET`)
    pub readers: Arc<TokenVerifier>,
    pub metrics: Arc<Metrics>,
}
