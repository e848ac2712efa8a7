//! Sitereview Services Layer
//!
//! Business services for review submissions: token generation and the review
//! service that ties image intake, tokens and persistence together. Also
//! re-exports the storage and processing API so binaries depend on one facade.

pub mod services;

pub use services::{
    ContactUpdateOutcome, GeneratedToken, ReviewService, SubmittedReview, TokenError,
    TokenGenerator, TokenOrigin,
};
pub use sitereview_processing::{
    CompressedImage, CompressionAttempt, CompressionEngine, ImageIntakePipeline, IntakeError,
    IntakeFailure, IntakeOptions, IntakeReport,
};
pub use sitereview_storage::{
    create_storage, MemoryStorage, Storage, StorageBackend, StorageError, StorageResult,
    UploadResult,
};
