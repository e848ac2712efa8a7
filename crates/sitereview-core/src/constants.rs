/// Size budget for a stored review image (1 MiB).
pub const MAX_COMPRESSED_IMAGE_BYTES: usize = 1024 * 1024;

/// Field name carrying review photos in a submission.
pub const REVIEW_IMAGE_FIELD: &str = "images";

/// Storage folder for review photos.
pub const REVIEW_IMAGE_FOLDER: &str = "user-reviews";

/// Maximum photos accepted per review.
pub const MAX_IMAGES_PER_REVIEW: usize = 5;

/// Upload timeout applied to each stored image.
pub const UPLOAD_TIMEOUT_SECS: u64 = 30;

/// Random token draws before falling back to the clock-derived token.
pub const TOKEN_MAX_ATTEMPTS: u32 = 100;

/// Number of reviews returned by the "recent" listing when no limit is given.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Connection pool size for the review database.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Seconds to wait for a pooled database connection.
pub const DB_TIMEOUT_SECS: u64 = 30;
