use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::Completion;

/// Per-file outcome. `Downloaded` and `Failed` are both final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    #[default]
    Pending,
    Downloaded,
    Failed,
}

impl FileStatus {
    pub fn is_settled(self) -> bool {
        !matches!(self, FileStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFile {
    pub url: String,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default)]
    pub attempts: u32,
}

impl DownloadFile {
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: FileStatus::Pending,
            attempts: 0,
        }
    }
}

/// Destination cluster, carried in the signed cluster token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fs_path: String,
    #[serde(default)]
    pub filter_category: String,
    #[serde(default)]
    pub root_category: String,
}

/// One batch of URLs, downloaded in order by the download actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub id: String,
    pub category_id: String,
    pub cluster: Cluster,
    pub files: Vec<DownloadFile>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(
        id: impl Into<String>,
        category_id: impl Into<String>,
        cluster: Cluster,
        urls: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: id.into(),
            category_id: category_id.into(),
            cluster,
            files: urls.into_iter().map(DownloadFile::pending).collect(),
            created_at: Utc::now(),
        }
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    pub fn pending_files(&self) -> usize {
        self.count(FileStatus::Pending)
    }

    pub fn outcome(&self) -> JobOutcome {
        JobOutcome {
            total: self.total_files(),
            downloaded: self.count(FileStatus::Downloaded),
            failed: self.count(FileStatus::Failed),
        }
    }
}

impl Completion for DownloadJob {
    fn job_id(&self) -> &str {
        &self.id
    }

    fn is_complete(&self) -> bool {
        self.files.iter().all(|f| f.status.is_settled())
    }
}

/// Job-level summary, so failed files stay visible after the job settles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub total: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// Progress pushed to the download's websocket listener after each file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub download_uuid: String,
    pub total_files: usize,
    pub downloaded_files: usize,
    #[serde(default)]
    pub failed_files: usize,
    pub completed: bool,
}

impl ProgressMessage {
    /// Progress after the file at 1-based `position` was attempted
    pub fn after_file(job: &DownloadJob, position: usize) -> Self {
        let total_files = job.total_files();
        Self {
            download_uuid: job.id.clone(),
            total_files,
            downloaded_files: position,
            failed_files: job.count(FileStatus::Failed),
            completed: position == total_files,
        }
    }
}
