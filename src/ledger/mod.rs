/// Fjall-based ledger of finished download batches
///
/// The ledger answers two questions for the downloads service:
///
/// - Has this download id been seen before, and with how many files?
/// - Which of its URLs were already fetched, so a resubmission can skip them?
///
/// Records are written by the download actor once a batch leaves the queue:
/// inserted the first time, merged by URL on later batches with the same id.
///
/// ## Usage
///
/// ```rust,ignore
/// use herald::ledger::{DownloadsRepository, FjallStore};
///
/// let store = FjallStore::open("data/ledger")?;
/// store.insert(&job)?;
/// let record = store.get(&job.id)?;
/// ```

pub mod error;
pub mod partitions;
pub mod store;

pub use error::{LedgerError, Result};
pub use store::{FjallStore, StoreStats};

use crate::downloads::{DownloadFile, DownloadJob};
use crate::proto::DownloadRecord;

/// Durable record of download batches
pub trait DownloadsRepository: Send + Sync {
    fn exists(&self, download_id: &str) -> Result<bool>;

    fn get(&self, download_id: &str) -> Result<Option<DownloadRecord>>;

    fn insert(&self, job: &DownloadJob) -> Result<()>;

    /// Merge `files` into an existing record and refresh its timestamp
    fn update_files(&self, download_id: &str, files: &[DownloadFile]) -> Result<()>;
}
