pub mod review;
pub mod token;

pub use review::{ContactUpdateOutcome, ReviewService, SubmittedReview};
pub use token::{GeneratedToken, TokenError, TokenGenerator, TokenOrigin};
