use async_trait::async_trait;
use sitereview_core::{
    AppError, Clock, ContactUpdate, NewReviewRecord, ReviewFilter, SystemClock, TokenLookup,
    UserReview,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for review repository operations
/// This abstracts the storage of review records
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, record: NewReviewRecord) -> Result<UserReview, AppError>;

    async fn get(&self, id: i64) -> Result<Option<UserReview>, AppError>;

    /// Apply the present fields of `update`. Returns `None` for an unknown id.
    async fn update_contact(
        &self,
        id: i64,
        update: ContactUpdate,
    ) -> Result<Option<UserReview>, AppError>;

    /// Matching reviews for the requested page, plus the total match count.
    async fn list(&self, filter: &ReviewFilter) -> Result<(Vec<UserReview>, usize), AppError>;

    async fn ratings_for_location(&self, location_id: i64) -> Result<Vec<f64>, AppError>;

    /// Newest reviews first.
    async fn recent(&self, limit: usize) -> Result<Vec<UserReview>, AppError>;

    async fn token_exists(&self, token: &str) -> Result<bool, AppError>;
}

/// Review repository held in process memory.
#[derive(Clone)]
pub struct InMemoryReviewRepository {
    reviews: Arc<RwLock<BTreeMap<i64, UserReview>>>,
    next_id: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

impl InMemoryReviewRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            reviews: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            clock,
        }
    }

    pub async fn count(&self) -> usize {
        self.reviews.read().await.len()
    }
}

impl Default for InMemoryReviewRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewRepository for InMemoryReviewRepository {
    async fn create(&self, record: NewReviewRecord) -> Result<UserReview, AppError> {
        let NewReviewRecord {
            request,
            images,
            token_number,
        } = record;

        let now = self.clock.now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let review = UserReview {
            id,
            rating: request.rating,
            reason_ids: request.reason_ids,
            latitude: request.latitude,
            longitude: request.longitude,
            description: request.description.unwrap_or_default(),
            location_id: request.location_id,
            company_id: request.company_id,
            images,
            token_number,
            name: request.name,
            email: request.email,
            phone: request.phone,
            created_at: now,
            updated_at: now,
        };

        self.reviews.write().await.insert(id, review.clone());

        tracing::debug!(review_id = id, "Review stored");

        Ok(review)
    }

    async fn get(&self, id: i64) -> Result<Option<UserReview>, AppError> {
        Ok(self.reviews.read().await.get(&id).cloned())
    }

    async fn update_contact(
        &self,
        id: i64,
        update: ContactUpdate,
    ) -> Result<Option<UserReview>, AppError> {
        let mut reviews = self.reviews.write().await;
        let Some(review) = reviews.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            review.name = Some(name);
        }
        if let Some(email) = update.email {
            review.email = Some(email);
        }
        if let Some(phone) = update.phone {
            review.phone = Some(phone);
        }
        review.updated_at = self.clock.now();

        Ok(Some(review.clone()))
    }

    async fn list(&self, filter: &ReviewFilter) -> Result<(Vec<UserReview>, usize), AppError> {
        let reviews = self.reviews.read().await;

        let mut matching: Vec<&UserReview> =
            reviews.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| filter.compare(a, b));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn ratings_for_location(&self, location_id: i64) -> Result<Vec<f64>, AppError> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .filter(|r| r.location_id == Some(location_id))
            .map(|r| r.rating)
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<UserReview>, AppError> {
        let filter = ReviewFilter {
            limit: Some(limit),
            ..ReviewFilter::default()
        };
        let (reviews, _) = self.list(&filter).await?;
        Ok(reviews)
    }

    async fn token_exists(&self, token: &str) -> Result<bool, AppError> {
        Ok(self
            .reviews
            .read()
            .await
            .values()
            .any(|r| r.token_number.as_str() == token))
    }
}

#[async_trait]
impl TokenLookup for InMemoryReviewRepository {
    async fn token_exists(&self, candidate: &str) -> anyhow::Result<bool> {
        Ok(ReviewRepository::token_exists(self, candidate).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use sitereview_core::{
        CreateReviewRequest, FixedClock, ReviewSortField, ReviewToken, SortOrder,
    };

    /// Advances one minute per reading so creation order is visible in timestamps.
    struct SteppingClock {
        ticks: AtomicI64,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(tick)
        }
    }

    fn record(rating: f64, location_id: Option<i64>, token: u32) -> NewReviewRecord {
        NewReviewRecord {
            request: CreateReviewRequest {
                rating,
                location_id,
                description: Some("clean and quiet".to_string()),
                ..CreateReviewRequest::default()
            },
            images: vec![],
            token_number: ReviewToken::from_number(token).unwrap(),
        }
    }

    fn stepping_repo() -> InMemoryReviewRepository {
        InMemoryReviewRepository::with_clock(Arc::new(SteppingClock {
            ticks: AtomicI64::new(0),
        }))
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let repo = InMemoryReviewRepository::with_clock(Arc::new(FixedClock::from_millis(0)));

        let first = repo.create(record(4.0, Some(1), 111111)).await.unwrap();
        let second = repo.create(record(3.0, Some(1), 222222)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.created_at, first.updated_at);
        assert_eq!(first.description, "clean and quiet");
        assert_eq!(repo.get(2).await.unwrap().unwrap().rating, 3.0);
        assert!(repo.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_exists_sees_stored_tokens() {
        let repo = InMemoryReviewRepository::new();
        repo.create(record(5.0, None, 123456)).await.unwrap();

        assert!(ReviewRepository::token_exists(&repo, "123456").await.unwrap());
        assert!(!TokenLookup::token_exists(&repo, "654321").await.unwrap());
    }

    #[tokio::test]
    async fn update_contact_only_touches_present_fields() {
        let repo = stepping_repo();
        let created = repo.create(record(4.0, None, 111111)).await.unwrap();

        let updated = repo
            .update_contact(
                created.id,
                ContactUpdate {
                    email: Some("ana@example.com".to_string()),
                    ..ContactUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.email.as_deref(), Some("ana@example.com"));
        assert!(updated.name.is_none());
        assert!(updated.updated_at > created.updated_at);

        let missing = repo
            .update_contact(99, ContactUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let repo = stepping_repo();
        repo.create(record(5.0, Some(1), 100001)).await.unwrap();
        repo.create(record(2.0, Some(1), 100002)).await.unwrap();
        repo.create(record(4.0, Some(2), 100003)).await.unwrap();
        repo.create(record(3.5, Some(1), 100004)).await.unwrap();

        // default: newest first
        let (all, total) = repo.list(&ReviewFilter::default()).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 3, 2, 1]);

        let filter = ReviewFilter {
            location_id: Some(1),
            min_rating: Some(3.0),
            sort_by: ReviewSortField::Rating,
            order: SortOrder::Asc,
            ..ReviewFilter::default()
        };
        let (page, total) = repo.list(&filter).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.iter().map(|r| r.rating).collect::<Vec<_>>(), vec![3.5, 5.0]);

        let filter = ReviewFilter {
            limit: Some(2),
            offset: Some(1),
            ..ReviewFilter::default()
        };
        let (page, total) = repo.list(&filter).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn ratings_and_recent() {
        let repo = stepping_repo();
        repo.create(record(5.0, Some(7), 100001)).await.unwrap();
        repo.create(record(1.0, Some(8), 100002)).await.unwrap();
        repo.create(record(3.0, Some(7), 100003)).await.unwrap();

        let mut ratings = repo.ratings_for_location(7).await.unwrap();
        ratings.sort_by(f64::total_cmp);
        assert_eq!(ratings, vec![3.0, 5.0]);
        assert!(repo.ratings_for_location(9).await.unwrap().is_empty());

        let recent = repo.recent(2).await.unwrap();
        assert_eq!(recent.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 2]);
    }
}
