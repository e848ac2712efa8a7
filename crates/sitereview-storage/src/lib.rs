//! Sitereview Storage Library
//!
//! Storage abstraction for review images, with S3, local filesystem and
//! in-memory implementations.
//!
//! # Storage key format
//!
//! Every backend stores an image under `{folder}/{uuid}.{ext}`, where `folder`
//! is the logical folder of the upload field (e.g. `user-reviews`) and `ext`
//! follows the image content type. Folders must not contain `..` or start with
//! `/`. Key generation lives in the `keys` module so all backends agree.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use sitereview_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult, UploadResult};
