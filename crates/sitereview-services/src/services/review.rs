use crate::services::token::{TokenGenerator, TokenOrigin};
use async_trait::async_trait;
use serde::Serialize;
use sitereview_core::constants::DEFAULT_RECENT_LIMIT;
use sitereview_core::{
    AppError, Clock, ContactUpdate, CreateReviewRequest, FieldSpec, ImageAsset, NewReviewRecord,
    ReviewConfig, ReviewFilter, ReviewPage, ReviewStats, ReviewToken, SystemClock, TokenLookup,
    UserReview,
};
use sitereview_db::{create_review_repository, ReviewRepository};
use sitereview_processing::{ImageIntakePipeline, IntakeFailure, IntakeOptions};
use sitereview_storage::{create_storage, Storage};
use std::sync::Arc;
use validator::Validate;

/// A stored review together with what the submitter needs to know about it.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedReview {
    pub review: UserReview,
    pub token: ReviewToken,
    pub token_origin: TokenOrigin,
    /// Images that could not be compressed or uploaded. The review is stored
    /// without them.
    pub image_failures: Vec<IntakeFailure>,
}

#[derive(Debug, Clone)]
pub enum ContactUpdateOutcome {
    /// Nothing non-blank was provided; no record was touched.
    NoChanges,
    Updated(UserReview),
}

/// Exposes a repository's token check to the token generator.
struct RepositoryTokenLookup<'a>(&'a dyn ReviewRepository);

#[async_trait]
impl TokenLookup for RepositoryTokenLookup<'_> {
    async fn token_exists(&self, candidate: &str) -> anyhow::Result<bool> {
        Ok(self.0.token_exists(candidate).await?)
    }
}

#[derive(Clone)]
pub struct ReviewService {
    repository: Arc<dyn ReviewRepository>,
    intake: ImageIntakePipeline,
    tokens: TokenGenerator,
    image_field: FieldSpec,
}

impl ReviewService {
    pub fn new(
        repository: Arc<dyn ReviewRepository>,
        intake: ImageIntakePipeline,
        tokens: TokenGenerator,
        image_field: FieldSpec,
    ) -> Self {
        Self {
            repository,
            intake,
            tokens,
            image_field,
        }
    }

    pub fn from_config(
        config: &ReviewConfig,
        repository: Arc<dyn ReviewRepository>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            repository,
            ImageIntakePipeline::new(storage, IntakeOptions::from_config(config)),
            TokenGenerator::new(config.token_max_attempts, clock),
            config.review_image_field(),
        )
    }

    /// Build the service with the storage backend and repository selected
    /// by `config`.
    pub async fn bootstrap(config: &ReviewConfig) -> Result<Self, AppError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = create_storage(config).await?;
        let repository = create_review_repository(config, clock.clone()).await?;

        tracing::info!(
            storage_backend = ?storage.backend_type(),
            durable = config.database_url.is_some(),
            "Review service initialized"
        );

        Ok(Self::from_config(config, repository, storage, clock))
    }

    pub fn image_field(&self) -> &FieldSpec {
        &self.image_field
    }

    /// Store a new review with its images and a fresh token.
    ///
    /// Image failures do not fail the submission; they are returned alongside
    /// the stored review. If the token or the record cannot be produced, images
    /// already uploaded for this submission are deleted again.
    pub async fn submit(
        &self,
        request: CreateReviewRequest,
        files: Vec<ImageAsset>,
    ) -> Result<SubmittedReview, AppError> {
        request.validate()?;

        let report = self
            .intake
            .process(std::slice::from_ref(&self.image_field), files)
            .await;
        let image_failures = report.failures();
        let images = report.urls(&self.image_field.field_name);

        let lookup = RepositoryTokenLookup(self.repository.as_ref());
        let generated = match self.tokens.generate(&lookup).await {
            Ok(generated) => generated,
            Err(e) => {
                self.intake.discard(&report).await;
                return Err(e.into());
            }
        };

        let record = NewReviewRecord {
            request,
            images,
            token_number: generated.token.clone(),
        };

        let review = match self.repository.create(record).await {
            Ok(review) => review,
            Err(e) => {
                let discarded = self.intake.discard(&report).await;
                tracing::error!(
                    error = %e,
                    discarded_images = discarded,
                    "Failed to store review, discarded uploaded images"
                );
                return Err(e);
            }
        };

        tracing::info!(
            review_id = review.id,
            images = review.images.len(),
            failed_images = image_failures.len(),
            "Review submitted"
        );

        Ok(SubmittedReview {
            review,
            token: generated.token,
            token_origin: generated.origin,
            image_failures,
        })
    }

    /// Add contact details to an existing review. Blank values are ignored.
    pub async fn update_contact(
        &self,
        id: i64,
        update: ContactUpdate,
    ) -> Result<ContactUpdateOutcome, AppError> {
        let update = update.normalized();
        if update.is_empty() {
            return Ok(ContactUpdateOutcome::NoChanges);
        }
        update.validate()?;

        match self.repository.update_contact(id, update).await? {
            Some(review) => {
                tracing::info!(review_id = id, "Review contact details updated");
                Ok(ContactUpdateOutcome::Updated(review))
            }
            None => Err(AppError::NotFound(format!("Review {}", id))),
        }
    }

    pub async fn get(&self, id: i64) -> Result<UserReview, AppError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review {}", id)))
    }

    /// One page of reviews. An inverted rating range matches nothing.
    pub async fn list(&self, filter: ReviewFilter) -> Result<ReviewPage, AppError> {
        if let (Some(min), Some(max)) = (filter.min_rating, filter.max_rating) {
            if min > max {
                tracing::debug!(min, max, "Inverted rating range, returning empty page");
                return Ok(ReviewPage {
                    limit: filter.limit.unwrap_or(0),
                    offset: filter.offset.unwrap_or(0),
                    total: 0,
                    data: Vec::new(),
                });
            }
        }

        let (data, total) = self.repository.list(&filter).await?;
        Ok(ReviewPage {
            limit: filter.limit.unwrap_or(data.len()),
            offset: filter.offset.unwrap_or(0),
            total,
            data,
        })
    }

    pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<UserReview>, AppError> {
        self.repository
            .recent(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
            .await
    }

    pub async fn location_stats(&self, location_id: i64) -> Result<ReviewStats, AppError> {
        let ratings = self.repository.ratings_for_location(location_id).await?;
        Ok(ReviewStats::from_ratings(&ratings))
    }
}
