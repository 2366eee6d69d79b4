use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use prost::Message;
use tracing::{debug, info};

use crate::downloads::{DownloadFile, DownloadJob};
use crate::proto::DownloadRecord;

use super::DownloadsRepository;
use super::error::{LedgerError, Result};
use super::partitions::{decode_download_key, encode_download_key};

/// Fjall-backed persistent storage for download records
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    downloads: PartitionHandle,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let downloads = keyspace.open_partition("downloads", PartitionCreateOptions::default())?;

        info!("Fjall store opened successfully");
        Ok(Self {
            keyspace,
            downloads,
        })
    }

    fn put(&self, record: &DownloadRecord) -> Result<()> {
        let key = encode_download_key(&record.download_id);
        self.downloads.insert(key, record.encode_to_vec())?;
        Ok(())
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Get internal statistics (for debugging/monitoring)
    pub fn stats(&self) -> Result<StoreStats> {
        let mut download_count = 0;
        let mut file_count = 0;

        for item in self.downloads.iter() {
            let (key, value) = item?;
            if decode_download_key(&key).is_none() {
                continue;
            }
            download_count += 1;
            file_count += DownloadRecord::decode(&*value)?.files.len();
        }

        Ok(StoreStats {
            download_count,
            file_count,
        })
    }
}

impl DownloadsRepository for FjallStore {
    fn exists(&self, download_id: &str) -> Result<bool> {
        Ok(self.downloads.contains_key(encode_download_key(download_id))?)
    }

    fn get(&self, download_id: &str) -> Result<Option<DownloadRecord>> {
        match self.downloads.get(encode_download_key(download_id))? {
            Some(value) => Ok(Some(DownloadRecord::decode(&*value)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, job: &DownloadJob) -> Result<()> {
        let record = DownloadRecord::from_job(job, chrono::Utc::now().timestamp());
        self.put(&record)?;
        debug!(download_id = %job.id, files = record.files.len(), "Inserted download record");
        Ok(())
    }

    fn update_files(&self, download_id: &str, files: &[DownloadFile]) -> Result<()> {
        let mut record = self
            .get(download_id)?
            .ok_or_else(|| LedgerError::NotFound(download_id.to_string()))?;

        record.merge_files(files);
        record.updated_at = chrono::Utc::now().timestamp();
        self.put(&record)?;
        debug!(download_id, files = record.files.len(), "Updated download record");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub download_count: usize,
    pub file_count: usize,
}
