//! Domain models
//!
//! Image intake descriptors, review records and the review token.

pub mod image;
pub mod review;
pub mod stats;
pub mod token;

pub use image::{FieldSpec, ImageAsset};
pub use review::{
    ContactUpdate, CreateReviewRequest, NewReviewRecord, ReviewFilter, ReviewPage,
    ReviewSortField, SortOrder, UserReview,
};
pub use stats::ReviewStats;
pub use token::{ReviewToken, TokenLookup};
