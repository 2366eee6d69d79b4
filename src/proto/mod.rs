//! Protobuf records persisted in the downloads ledger
//!
//! - `DownloadRecord` - One finished download batch
//! - `RecordedFile` - Per-URL outcome within a batch
//!
//! ## Usage
//!
//! ```rust,ignore
//! use herald::proto::{DownloadRecord, FileState};
//! use prost::Message;
//!
//! let bytes = record.encode_to_vec();
//! let decoded = DownloadRecord::decode(&bytes[..])?;
//! ```

use std::collections::HashSet;

use crate::downloads::{DownloadFile, DownloadJob, FileStatus};

#[derive(Clone, PartialEq, prost::Message)]
pub struct DownloadRecord {
    #[prost(string, tag = "1")]
    pub download_id: String,
    #[prost(string, tag = "2")]
    pub category_id: String,
    #[prost(string, tag = "3")]
    pub cluster_id: String,
    /// Unix seconds of the last insert or update
    #[prost(int64, tag = "4")]
    pub updated_at: i64,
    #[prost(message, repeated, tag = "5")]
    pub files: Vec<RecordedFile>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RecordedFile {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(enumeration = "FileState", tag = "2")]
    pub state: i32,
    #[prost(uint32, tag = "3")]
    pub attempts: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FileState {
    Pending = 0,
    Downloaded = 1,
    Failed = 2,
}

impl From<FileStatus> for FileState {
    fn from(status: FileStatus) -> Self {
        match status {
            FileStatus::Pending => FileState::Pending,
            FileStatus::Downloaded => FileState::Downloaded,
            FileStatus::Failed => FileState::Failed,
        }
    }
}

impl From<&DownloadFile> for RecordedFile {
    fn from(file: &DownloadFile) -> Self {
        Self {
            url: file.url.clone(),
            state: FileState::from(file.status) as i32,
            attempts: file.attempts,
        }
    }
}

impl DownloadRecord {
    pub fn from_job(job: &DownloadJob, updated_at: i64) -> Self {
        Self {
            download_id: job.id.clone(),
            category_id: job.category_id.clone(),
            cluster_id: job.cluster.uuid.clone(),
            updated_at,
            files: job.files.iter().map(RecordedFile::from).collect(),
        }
    }

    /// URLs already fetched successfully for this download
    pub fn downloaded_urls(&self) -> HashSet<&str> {
        self.files
            .iter()
            .filter(|file| file.state() == FileState::Downloaded)
            .map(|file| file.url.as_str())
            .collect()
    }

    /// Merge `files` by URL: known URLs take the new state, new URLs are appended.
    pub fn merge_files(&mut self, files: &[DownloadFile]) {
        for file in files {
            let recorded = RecordedFile::from(file);
            match self.files.iter_mut().find(|existing| existing.url == file.url) {
                Some(existing) => *existing = recorded,
                None => self.files.push(recorded),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloads::Cluster;
    use prost::Message;

    fn job() -> DownloadJob {
        let mut job = DownloadJob::new(
            "d1",
            "cat-1",
            Cluster {
                uuid: "c1".to_string(),
                ..Cluster::default()
            },
            ["http://a/1.jpg".to_string(), "http://a/2.jpg".to_string()],
        );
        job.files[0].status = FileStatus::Downloaded;
        job.files[1].status = FileStatus::Failed;
        job.files[1].attempts = 3;
        job
    }

    #[test]
    fn test_record_keeps_failure_identity() {
        let record = DownloadRecord::from_job(&job(), 42);
        let decoded = DownloadRecord::decode(&record.encode_to_vec()[..]).unwrap();

        assert_eq!(decoded.cluster_id, "c1");
        assert_eq!(decoded.files[0].state(), FileState::Downloaded);
        assert_eq!(decoded.files[1].state(), FileState::Failed);
        assert_eq!(decoded.files[1].attempts, 3);
    }

    #[test]
    fn test_downloaded_urls_excludes_failed() {
        let record = DownloadRecord::from_job(&job(), 0);
        let urls = record.downloaded_urls();
        assert!(urls.contains("http://a/1.jpg"));
        assert!(!urls.contains("http://a/2.jpg"));
    }

    #[test]
    fn test_merge_updates_known_and_appends_new() {
        let mut record = DownloadRecord::from_job(&job(), 0);
        let mut retried = DownloadFile::pending("http://a/2.jpg");
        retried.status = FileStatus::Downloaded;

        record.merge_files(&[retried, DownloadFile::pending("http://a/3.jpg")]);

        assert_eq!(record.files.len(), 3);
        assert_eq!(record.files[1].state(), FileState::Downloaded);
        assert_eq!(record.files[2].state(), FileState::Pending);
    }
}
