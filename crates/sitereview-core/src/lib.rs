//! Sitereview Core Library
//!
//! This crate provides the domain models, error types, configuration and clock
//! abstraction shared by every sitereview component.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ReviewConfig;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ContactUpdate, CreateReviewRequest, FieldSpec, ImageAsset, NewReviewRecord, ReviewFilter,
    ReviewPage, ReviewSortField, ReviewStats, ReviewToken, SortOrder, TokenLookup, UserReview,
};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, UploadResult live in the sitereview-storage crate
