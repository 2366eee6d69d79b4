//! Download processor - the unit of work behind the download actor

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::http::FetchError;
use super::retry::{Attempted, RetryPolicy};
use super::Fetcher;
use crate::downloads::{Cluster, DownloadJob, FileStatus, ProgressMessage};
use crate::ledger::DownloadsRepository;
use crate::listener::ProgressListeners;
use crate::observability::Metrics;
use crate::queue::{JobProcessor, SharedQueue};
use crate::storage::{MediaUploader, StorageError};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Download failed: {0}")]
    DownloadFailed(#[from] FetchError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Downloads the files of the next queued job, one at a time, in order
///
/// For every pending file: fetch + upload under the retry policy, record
/// `Downloaded` or `Failed`, write the status back to the queued job and
/// report progress. Settled files are skipped, so a job that comes round
/// again is never re-fetched. Once the queue hands the job back as
/// complete it is persisted to the ledger.
pub struct DownloadProcessor {
    fetcher: Arc<dyn Fetcher>,
    uploader: Arc<dyn MediaUploader>,
    repository: Arc<dyn DownloadsRepository>,
    listeners: Arc<ProgressListeners>,
    retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl DownloadProcessor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        uploader: Arc<dyn MediaUploader>,
        repository: Arc<dyn DownloadsRepository>,
        listeners: Arc<ProgressListeners>,
        retry: RetryPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            fetcher,
            uploader,
            repository,
            listeners,
            retry,
            metrics,
        }
    }

    async fn download_files(&self, seq: u64, job: &mut DownloadJob, queue: &SharedQueue<DownloadJob>) {
        let pending = job.pending_files();
        if pending == 0 {
            debug!(download_id = %job.id, "All files settled, nothing to fetch");
            return;
        }

        info!(
            download_id = %job.id,
            category_id = %job.category_id,
            total = job.total_files(),
            pending,
            "Downloading batch"
        );

        if let Err(e) = self
            .uploader
            .begin_batch(&job.id, &job.category_id, job.total_files())
            .await
        {
            warn!(download_id = %job.id, error = %e, "Failed to open upload batch");
        }

        for index in 0..job.files.len() {
            if job.files[index].status.is_settled() {
                continue;
            }

            let attempted = self.download_file(job, index).await;

            let file = &mut job.files[index];
            file.attempts = attempted.attempts;
            file.status = match attempted.result {
                Ok(()) => {
                    self.metrics.file_downloaded();
                    FileStatus::Downloaded
                }
                Err(e) => {
                    warn!(download_id = %job.id, url = %file.url, attempts = file.attempts, error = %e, "File failed");
                    self.metrics.file_failed();
                    FileStatus::Failed
                }
            };

            let settled = file.clone();
            if let Some(queued) = queue.lock().get_mut(seq) {
                if let Some(slot) = queued.files.get_mut(index) {
                    *slot = settled;
                }
            }

            self.listeners
                .report(&ProgressMessage::after_file(job, index + 1))
                .await;
        }

        let outcome = job.outcome();
        info!(
            download_id = %job.id,
            downloaded = outcome.downloaded,
            failed = outcome.failed,
            "Batch finished"
        );
    }

    async fn download_file(&self, job: &DownloadJob, index: usize) -> Attempted<(), TaskError> {
        let url = job.files[index].url.as_str();
        let filename = file_name_for(url, &job.id, index);
        let filename = filename.as_str();
        let cluster = &job.cluster;
        let category_id = job.category_id.as_str();

        self.retry
            .run(url, move |_| self.fetch_and_upload(cluster, category_id, url, filename))
            .await
    }

    async fn fetch_and_upload(
        &self,
        cluster: &Cluster,
        category_id: &str,
        url: &str,
        filename: &str,
    ) -> Result<()> {
        let body = self.fetcher.fetch(url).await?;
        self.uploader
            .upload(cluster, category_id, filename, body)
            .await?;
        Ok(())
    }

    fn record(&self, job: &DownloadJob) {
        let result = match self.repository.exists(&job.id) {
            Ok(true) => self.repository.update_files(&job.id, &job.files),
            Ok(false) => self.repository.insert(job),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.metrics.download_recorded();
                info!(download_id = %job.id, files = job.total_files(), "Download recorded");
            }
            Err(e) => error!(download_id = %job.id, error = %e, "Failed to record download"),
        }
    }
}

#[async_trait]
impl JobProcessor for DownloadProcessor {
    type Item = DownloadJob;

    fn name(&self) -> &'static str {
        "downloads"
    }

    async fn process_next(&self, queue: &SharedQueue<DownloadJob>) -> bool {
        let Some((seq, mut job)) = queue.peek() else {
            return false;
        };

        self.download_files(seq, &mut job, queue).await;

        match queue.dequeue_completed() {
            Ok(Some(done)) => {
                self.record(&done);
                true
            }
            Ok(None) => false,
            Err(e) => {
                // A newer job arrived at the head while this one ran; this job
                // is dequeued on a later pass without re-fetching anything.
                error!(download_id = %job.id, error = %e, "Dequeue deferred");
                false
            }
        }
    }
}

/// Name a file after the last path segment of its URL
pub fn file_name_for(url: &str, download_id: &str, index: usize) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}-{}", download_id, index))
}
