/// Disk-based blob storage backend
use crate::{
    blob_store::BlobBackend,
    error::{CoffeyError, CoffeyResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Keys contain path separators ("chatter/json/..."), which map directly to
/// subdirectories under the base path.
#[derive(Clone)]
pub struct DiskBlobBackend {
    base_path: PathBuf,
}

impl DiskBlobBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    async fn ensure_blob_dir(&self, key: &str) -> CoffeyResult<PathBuf> {
        let blob_path = self.blob_path(key);
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CoffeyError::BlobStorage(format!("Failed to create blob directory: {}", e))
            })?;
        }
        Ok(blob_path)
    }
}

#[async_trait]
impl BlobBackend for DiskBlobBackend {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> CoffeyResult<()> {
        let blob_path = self.ensure_blob_dir(key).await?;

        fs::write(&blob_path, data)
            .await
            .map_err(|e| CoffeyError::BlobStorage(format!("Failed to write blob {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> CoffeyResult<Option<Vec<u8>>> {
        let blob_path = self.blob_path(key);

        match fs::read(&blob_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoffeyError::BlobStorage(format!(
                "Failed to read blob {}: {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> CoffeyResult<bool> {
        Ok(self.blob_path(key).exists())
    }

    async fn delete(&self, key: &str) -> CoffeyResult<()> {
        let blob_path = self.blob_path(key);

        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoffeyError::BlobStorage(format!(
                "Failed to delete blob {}: {}",
                key, e
            ))),
        }
    }
}
