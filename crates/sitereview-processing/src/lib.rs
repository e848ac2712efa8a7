//! Sitereview Processing Library
//!
//! Image intake for review submissions: size-bounded compression of uploaded
//! photos and the concurrent compress-then-upload pipeline that turns a batch
//! of files into storage URLs.

pub mod compression;
pub mod pipeline;

pub use compression::{
    CompressedImage, CompressionAttempt, CompressionEngine, CompressionError, LossyEncoder,
    WebpEncoder, QUALITY_STEPS, WEBP_MAX_DIMENSION,
};
pub use pipeline::{
    FileOutcome, ImageIntakePipeline, IntakeError, IntakeFailure, IntakeOptions, IntakeReport,
};
