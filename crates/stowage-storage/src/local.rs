use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{ByteReader, Driver, FileContent, StorageError, StorageResult};
use crate::StorageBackend;

/// Local filesystem storage driver
///
/// Objects of local policies are proxied through the service, so `presigned_url`
/// only returns the plain public URL under `base_url`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/stowage/uploads")
    /// * `base_url` - Base URL the directory is published under, if any
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that could escape the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        } else if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for LocalStorage {
    async fn put(&self, key: &str, mut reader: ByteReader, size: u64) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write stream to file {}: {}",
                path.display(),
                e
            ))
        })?;

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = bytes_copied,
            declared_size = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(bytes_copied)
    }

    async fn get(&self, key: &str) -> StorageResult<FileContent> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .len();

        tracing::debug!(key = %key, size_bytes = size, "Local storage object opened");

        Ok(FileContent {
            reader: Box::new(file),
            size,
        })
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            let path = self.key_to_path(key)?;

            if !fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }

            fs::remove_file(&path).await.map_err(|e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                ))
            })?;

            tracing::info!(path = %path.display(), key = %key, "Local storage delete successful");
        }

        Ok(())
    }

    async fn presigned_url(
        &self,
        key: &str,
        _ttl: Duration,
        _file_name: &str,
        _is_download: bool,
    ) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(self.generate_url(key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
