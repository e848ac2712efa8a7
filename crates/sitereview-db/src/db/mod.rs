//! Review repositories.
//!
//! `ReviewRepository` is the persistence seam used by the review service.
//! `PgReviewRepository` stores reviews in PostgreSQL; the in-memory
//! implementation backs development setups and tests. `create_review_repository`
//! picks one from the configuration.

pub mod postgres;
pub mod review;
pub mod setup;

pub use postgres::PgReviewRepository;
pub use review::{InMemoryReviewRepository, ReviewRepository};
pub use setup::{create_review_repository, setup_database};
