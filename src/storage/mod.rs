//! Media storage for downloaded images
//! Uses Apache Arrow object_store crate

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, memory::InMemory, path::Path as StoragePath};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};
use crate::downloads::Cluster;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Where downloaded files end up
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Announce a batch of `total` uploads before the first one
    async fn begin_batch(&self, _download_id: &str, _category_id: &str, _total: usize) -> Result<()> {
        Ok(())
    }

    async fn upload(
        &self,
        cluster: &Cluster,
        category_id: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<UploadMetadata>;
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Memory => Ok(Self::in_memory()),
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.root)?;
                let store = LocalFileSystem::new_with_prefix(&config.root)?;
                tracing::info!(root = %config.root.display(), "Using local media storage");
                Ok(Self::new(Arc::new(store)))
            }
        }
    }

    /// Object key for a file: `{fs_path}/{category_id}/{filename}`
    pub fn object_key(cluster: &Cluster, category_id: &str, filename: &str) -> String {
        [cluster.fs_path.as_str(), category_id, filename]
            .iter()
            .map(|part| part.trim_matches('/'))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Upload bytes to storage
    pub async fn put(&self, key: &str, data: Bytes) -> Result<UploadMetadata> {
        if key.is_empty() {
            return Err(StorageError::UploadFailed("empty object key".to_string()));
        }

        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag.clone(),
            size,
        })
    }

    /// Download from storage
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let path = StoragePath::from(key);
        let bytes = self.store.get(&path).await?.bytes().await?;
        Ok(bytes)
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MediaUploader for StorageClient {
    async fn begin_batch(&self, download_id: &str, category_id: &str, total: usize) -> Result<()> {
        tracing::debug!(download_id, category_id, total, "Upload batch started");
        Ok(())
    }

    async fn upload(
        &self,
        cluster: &Cluster,
        category_id: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<UploadMetadata> {
        let key = Self::object_key(cluster, category_id, filename);
        self.put(&key, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cluster(fs_path: &str) -> Cluster {
        Cluster {
            uuid: "cluster-1".to_string(),
            fs_path: fs_path.to_string(),
            ..Cluster::default()
        }
    }

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            StorageClient::object_key(&cluster("/mnt/media/"), "cat-1", "a.jpg"),
            "mnt/media/cat-1/a.jpg"
        );
        assert_eq!(
            StorageClient::object_key(&cluster(""), "cat-1", "a.jpg"),
            "cat-1/a.jpg"
        );
    }

    #[tokio::test]
    async fn test_upload_round_trip_in_memory() {
        let storage = StorageClient::in_memory();
        let meta = storage
            .upload(&cluster("media"), "cat-1", "a.jpg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        assert_eq!(meta.key, "media/cat-1/a.jpg");
        assert_eq!(meta.size, 4);
        assert!(storage.exists("media/cat-1/a.jpg").await.unwrap());
        assert_eq!(storage.get("media/cat-1/a.jpg").await.unwrap(), Bytes::from_static(b"jpeg"));
    }

    #[tokio::test]
    async fn test_local_provider_writes_under_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            provider: StorageProvider::Local,
            root: temp_dir.path().join("medias"),
        };

        let storage = StorageClient::from_config(&config).unwrap();
        storage
            .upload(&cluster("c1"), "cat-1", "b.png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert!(temp_dir.path().join("medias/c1/cat-1/b.png").exists());
    }

    #[tokio::test]
    async fn test_missing_key_does_not_exist() {
        let storage = StorageClient::in_memory();
        assert!(!storage.exists("nothing/here").await.unwrap());
    }
}
