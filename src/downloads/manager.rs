use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Cluster, DownloadJob};
use crate::config::DownloadsConfig;
use crate::ledger::DownloadsRepository;
use crate::listener::{Connection, ProgressListeners};
use crate::observability::Metrics;
use crate::queue::{ActorHandle, JobActor, JobSubmitter, SharedQueue, wake_channel};
use crate::storage::MediaUploader;
use crate::worker::{DownloadProcessor, Fetcher, RetryPolicy};

/// A batch as handed over by the API, after the cluster token was verified
#[derive(Debug, Clone)]
pub struct BatchSubmission {
    pub cluster: Cluster,
    pub category_id: String,
    pub urls: Vec<String>,
    /// Caller-supplied id; resubmissions under the same id skip what is already downloaded
    pub download_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitted {
    pub download_id: String,
    pub queued_files: usize,
}

/// DownloadManager is the producer side of the download actor
///
/// It owns the submitter for the actor's queue and the progress listener
/// registry the actor reports to.
pub struct DownloadManager {
    submitter: JobSubmitter<DownloadJob>,
    listeners: Arc<ProgressListeners>,
    repository: Arc<dyn DownloadsRepository>,
    metrics: Arc<Metrics>,
    actor: ActorHandle,
}

impl DownloadManager {
    /// Start the download actor
    pub fn spawn(
        config: &DownloadsConfig,
        fetcher: Arc<dyn Fetcher>,
        uploader: Arc<dyn MediaUploader>,
        repository: Arc<dyn DownloadsRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let listeners = Arc::new(ProgressListeners::new(Duration::from_millis(
            config.listener_write_timeout_ms,
        )));
        let retry = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        );

        let processor = DownloadProcessor::new(
            fetcher,
            uploader,
            repository.clone(),
            listeners.clone(),
            retry,
            metrics.clone(),
        );

        let queue = SharedQueue::new(config.ordering);
        let (wake_tx, wake_rx) = wake_channel();
        let actor = JobActor::new(processor, queue.clone(), wake_rx).spawn();

        info!(ordering = ?config.ordering, max_attempts = config.max_attempts, "Download actor started");

        Self {
            submitter: JobSubmitter::new(queue, wake_tx),
            listeners,
            repository,
            metrics,
            actor,
        }
    }

    /// Admit a batch. Returns the job id even when nothing was queued.
    pub async fn submit(&self, batch: BatchSubmission) -> Submitted {
        let supplied = batch.download_id.filter(|id| !id.is_empty());

        let (download_id, urls) = match supplied {
            Some(id) => {
                let urls = self.strip_downloaded(&id, batch.urls);
                (id, urls)
            }
            None => (Uuid::now_v7().to_string(), batch.urls),
        };

        if urls.is_empty() {
            info!(download_id = %download_id, "Nothing left to download, batch not queued");
            return Submitted {
                download_id,
                queued_files: 0,
            };
        }

        let job = DownloadJob::new(download_id.clone(), batch.category_id, batch.cluster, urls);
        let queued_files = job.total_files();
        let seq = self.submitter.submit(job).await;
        self.metrics.download_accepted();

        info!(download_id = %download_id, seq, files = queued_files, "Download batch queued");
        Submitted {
            download_id,
            queued_files,
        }
    }

    /// Drop URLs the ledger already has as downloaded for `download_id`
    fn strip_downloaded(&self, download_id: &str, urls: Vec<String>) -> Vec<String> {
        let record = match self.repository.get(download_id) {
            Ok(Some(record)) => record,
            Ok(None) => return urls,
            Err(e) => {
                warn!(download_id, error = %e, "Ledger lookup failed, admitting the full batch");
                return urls;
            }
        };

        let done = record.downloaded_urls();
        let before = urls.len();
        let urls: Vec<String> = urls
            .into_iter()
            .filter(|url| !done.contains(url.as_str()))
            .collect();

        debug!(download_id, skipped = before - urls.len(), "Stripped already downloaded URLs");
        urls
    }

    /// Id of the job the actor would take next, if any
    pub fn current_download(&self) -> Option<String> {
        self.submitter.queue().lock().peek().map(|job| job.id.clone())
    }

    pub fn queued(&self) -> usize {
        self.submitter.queue().len()
    }

    pub fn register_listener(&self, download_id: &str, conn: Connection) -> crate::listener::Result<()> {
        self.listeners.register(download_id, conn)
    }

    pub fn has_listener(&self, download_id: &str) -> bool {
        self.listeners.is_registered(download_id)
    }

    pub fn release_listener(&self, download_id: &str, connection: Uuid) -> bool {
        self.listeners.release(download_id, connection)
    }

    pub fn repository(&self) -> &Arc<dyn DownloadsRepository> {
        &self.repository
    }

    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    pub fn is_healthy(&self) -> bool {
        self.submitter.health_check()
    }

    /// Signal the actor to stop. Queued jobs are abandoned.
    pub async fn shutdown(&self) {
        self.submitter.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloads::FileStatus;
    use crate::ledger::FjallStore;
    use crate::queue::{ActorState, OrderingPolicy};
    use crate::storage::StorageClient;
    use crate::worker::FetchError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingFetcher {
        hits: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
            self.hits.lock().push(url.to_string());
            Ok(Bytes::from_static(b"image"))
        }
    }

    fn config() -> DownloadsConfig {
        DownloadsConfig {
            retry_backoff_ms: 0,
            ordering: OrderingPolicy::Fifo,
            ..DownloadsConfig::default()
        }
    }

    fn manager(temp: &TempDir, fetcher: Arc<CountingFetcher>) -> (DownloadManager, Arc<FjallStore>) {
        let store = Arc::new(FjallStore::open(temp.path().join("ledger")).unwrap());
        let manager = DownloadManager::spawn(
            &config(),
            fetcher,
            Arc::new(StorageClient::in_memory()),
            store.clone(),
            Arc::new(Metrics::new()),
        );
        (manager, store)
    }

    fn batch(id: Option<&str>, urls: &[&str]) -> BatchSubmission {
        BatchSubmission {
            cluster: Cluster::default(),
            category_id: "cat-1".to_string(),
            urls: urls.iter().map(|u| u.to_string()).collect(),
            download_id: id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_generated_id_when_none_supplied() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = manager(&temp, Arc::new(CountingFetcher::default()));

        let first = manager.submit(batch(None, &["http://cdn/1.jpg"])).await;
        let second = manager.submit(batch(Some(""), &["http://cdn/2.jpg"])).await;

        assert!(Uuid::parse_str(&first.download_id).is_ok());
        assert_ne!(first.download_id, second.download_id);
        assert_eq!(first.queued_files, 1);
    }

    #[tokio::test]
    async fn test_batch_is_downloaded_and_recorded() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher::default());
        let (manager, store) = manager(&temp, fetcher.clone());

        let submitted = manager
            .submit(batch(Some("d1"), &["http://cdn/1.jpg", "http://cdn/2.jpg"]))
            .await;
        manager.actor().wait_processed(1).await;

        assert_eq!(submitted.download_id, "d1");
        let record = store.get("d1").unwrap().unwrap();
        assert_eq!(record.downloaded_urls().len(), 2);
        assert_eq!(fetcher.hits.lock().len(), 2);
        assert_eq!(manager.current_download(), None);
    }

    #[tokio::test]
    async fn test_resubmission_strips_downloaded_urls() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher::default());
        let (manager, store) = manager(&temp, fetcher.clone());

        let mut previous = DownloadJob::new(
            "d1",
            "cat-1",
            Cluster::default(),
            ["http://cdn/1.jpg".to_string(), "http://cdn/2.jpg".to_string()],
        );
        previous.files[0].status = FileStatus::Downloaded;
        previous.files[1].status = FileStatus::Failed;
        store.insert(&previous).unwrap();

        let submitted = manager
            .submit(batch(
                Some("d1"),
                &["http://cdn/1.jpg", "http://cdn/2.jpg", "http://cdn/3.jpg"],
            ))
            .await;
        assert_eq!(submitted.queued_files, 2);

        manager.actor().wait_processed(1).await;
        assert_eq!(
            *fetcher.hits.lock(),
            vec!["http://cdn/2.jpg".to_string(), "http://cdn/3.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fully_downloaded_resubmission_is_not_queued() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(CountingFetcher::default());
        let (manager, store) = manager(&temp, fetcher.clone());

        let mut previous = DownloadJob::new(
            "d1",
            "cat-1",
            Cluster::default(),
            ["http://cdn/1.jpg".to_string()],
        );
        previous.files[0].status = FileStatus::Downloaded;
        store.insert(&previous).unwrap();

        let submitted = manager.submit(batch(Some("d1"), &["http://cdn/1.jpg"])).await;

        assert_eq!(submitted.download_id, "d1");
        assert_eq!(submitted.queued_files, 0);
        assert_eq!(manager.queued(), 0);
        assert_eq!(manager.actor().status().processed, 0);
        assert!(fetcher.hits.lock().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_terminates_actor() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = manager(&temp, Arc::new(CountingFetcher::default()));

        assert!(manager.is_healthy());
        manager.shutdown().await;
        let status = manager
            .actor()
            .wait_for(|s| s.state == ActorState::Terminated)
            .await;
        assert_eq!(status.state, ActorState::Terminated);
    }
}
