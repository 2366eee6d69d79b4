//! Download batches: job model, progress messages and the manager that
//! admits batches into the download actor's queue

pub mod manager;
pub mod models;

pub use manager::{BatchSubmission, DownloadManager, Submitted};
pub use models::{Cluster, DownloadFile, DownloadJob, FileStatus, JobOutcome, ProgressMessage};
