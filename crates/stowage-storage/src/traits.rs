//! Storage driver trait
//!
//! This module defines the `Driver` trait that every physical storage backend
//! implements, and the error type drivers report.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use stowage_core::AppError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("storage object {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg) => AppError::Io(msg),
            StorageError::IoError(e) => AppError::Io(e.to_string()),
            StorageError::BackendError(msg) | StorageError::ConfigError(msg) => {
                AppError::Storage(msg)
            }
        }
    }
}

/// Byte stream consumed by [`Driver::put`].
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Readable and seekable object content, so callers can serve ranges.
pub trait SeekableReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableReader for T {}

/// Content of a stored object returned by [`Driver::get`].
pub struct FileContent {
    pub reader: Box<dyn SeekableReader>,
    pub size: u64,
}

impl std::fmt::Debug for FileContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileContent")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Storage driver trait
///
/// Keys are opaque relative paths produced by [`crate::keys::generate_save_key`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Write `reader` to `key`, replacing any existing object, and return the number
    /// of bytes written. `size` is the size declared by the client.
    async fn put(&self, key: &str, reader: ByteReader, size: u64) -> StorageResult<u64>;

    /// Open the object at `key`.
    async fn get(&self, key: &str) -> StorageResult<FileContent>;

    /// Delete objects. Missing objects are not an error.
    async fn delete(&self, keys: &[String]) -> StorageResult<()>;

    /// Temporary URL the client can fetch `key` from directly.
    ///
    /// `file_name` is the name the client should save the object as when
    /// `is_download` is set.
    async fn presigned_url(
        &self,
        key: &str,
        ttl: Duration,
        file_name: &str,
        is_download: bool,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
