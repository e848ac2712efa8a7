//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use serde::Serialize;
use sitereview_core::AppError;
use thiserror::Error;

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
            StorageError::NotFound(key) => AppError::NotFound(format!("Stored file {}", key)),
            StorageError::InvalidKey(_) => AppError::InvalidInput(err.to_string()),
            StorageError::ConfigError(_) => AppError::Internal(err.to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Reference to a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Backend-internal identifier, used for deletes.
    pub key: String,
    /// Publicly reachable absolute URL.
    pub url: String,
    pub folder: String,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem, memory) implement this trait so
/// the intake pipeline never couples to a specific vendor.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store an image in `folder` with a single attempt.
    ///
    /// The object name is generated by the backend; `content_type` picks the
    /// extension. Errors from the underlying transport are returned as-is,
    /// nothing is retried.
    async fn upload(
        &self,
        folder: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<UploadResult>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a file by its storage key. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
