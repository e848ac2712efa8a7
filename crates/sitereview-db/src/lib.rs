//! Sitereview persistence layer.

pub mod db;

pub use db::{
    create_review_repository, setup_database, InMemoryReviewRepository, PgReviewRepository,
    ReviewRepository,
};
