use crate::db::review::ReviewRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sitereview_core::{
    AppError, Clock, ContactUpdate, NewReviewRecord, ReviewFilter, ReviewSortField, ReviewToken,
    SortOrder, SystemClock, TokenLookup, UserReview,
};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

const REVIEW_COLUMNS: &str = "id, rating, reason_ids, latitude, longitude, description, \
     location_id, company_id, images, token_number, name, email, phone, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    rating: f64,
    reason_ids: Vec<i64>,
    latitude: f64,
    longitude: f64,
    description: String,
    location_id: Option<i64>,
    company_id: Option<i64>,
    images: Vec<String>,
    token_number: String,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReviewRow {
    fn into_review(self) -> Result<UserReview, AppError> {
        let token_number = ReviewToken::parse(self.token_number.trim()).map_err(|e| {
            AppError::Database(format!(
                "Invalid token_number stored for review {}: {}",
                self.id, e
            ))
        })?;

        Ok(UserReview {
            id: self.id,
            rating: self.rating,
            reason_ids: self.reason_ids,
            latitude: self.latitude,
            longitude: self.longitude,
            description: self.description,
            location_id: self.location_id,
            company_id: self.company_id,
            images: self.images,
            token_number,
            name: self.name,
            email: self.email,
            phone: self.phone,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!(error = ?e, operation, "Review query failed");
        AppError::Database(format!("PostgreSQL error during {}: {}", operation, e))
    }
}

/// `AND ...` conditions for `filter`, numbered from `$1`, and the next free
/// parameter number. Bind with [`bind_filter`] in the same order.
fn filter_conditions(filter: &ReviewFilter) -> (String, usize) {
    let mut conditions = String::new();
    let mut param_count = 1;

    if filter.location_id.is_some() {
        conditions.push_str(&format!(" AND location_id = ${}", param_count));
        param_count += 1;
    }
    if filter.company_id.is_some() {
        conditions.push_str(&format!(" AND company_id = ${}", param_count));
        param_count += 1;
    }
    if filter.min_rating.is_some() {
        conditions.push_str(&format!(" AND rating >= ${}", param_count));
        param_count += 1;
    }
    if filter.max_rating.is_some() {
        conditions.push_str(&format!(" AND rating <= ${}", param_count));
        param_count += 1;
    }

    (conditions, param_count)
}

fn order_clause(filter: &ReviewFilter) -> String {
    let column = match filter.sort_by {
        ReviewSortField::CreatedAt => "created_at",
        ReviewSortField::UpdatedAt => "updated_at",
        ReviewSortField::Rating => "rating",
    };
    let direction = match filter.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    // ids break ties so paging is stable
    format!(" ORDER BY {} {}, id {}", column, direction, direction)
}

fn list_sql(filter: &ReviewFilter) -> String {
    let (conditions, mut param_count) = filter_conditions(filter);
    let mut sql = format!(
        "SELECT {} FROM user_reviews WHERE 1=1{}{}",
        REVIEW_COLUMNS,
        conditions,
        order_clause(filter)
    );

    if filter.limit.is_some() {
        sql.push_str(&format!(" LIMIT ${}", param_count));
        param_count += 1;
    }
    if filter.offset.is_some() {
        sql.push_str(&format!(" OFFSET ${}", param_count));
    }

    sql
}

fn count_sql(filter: &ReviewFilter) -> String {
    let (conditions, _) = filter_conditions(filter);
    format!("SELECT COUNT(*) FROM user_reviews WHERE 1=1{}", conditions)
}

fn bind_filter<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    filter: &ReviewFilter,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    if let Some(location_id) = filter.location_id {
        query = query.bind(location_id);
    }
    if let Some(company_id) = filter.company_id {
        query = query.bind(company_id);
    }
    if let Some(min_rating) = filter.min_rating {
        query = query.bind(min_rating);
    }
    if let Some(max_rating) = filter.max_rating {
        query = query.bind(max_rating);
    }
    query
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Review repository backed by the `user_reviews` table.
#[derive(Clone)]
pub struct PgReviewRepository {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    #[tracing::instrument(skip(self, record), fields(
        db.system = "postgresql",
        db.table = "user_reviews",
        db.operation = "insert"
    ))]
    async fn create(&self, record: NewReviewRecord) -> Result<UserReview, AppError> {
        let NewReviewRecord {
            request,
            images,
            token_number,
        } = record;
        let now = self.clock.now();

        let row = sqlx::query_as::<Postgres, ReviewRow>(&format!(
            r#"
            INSERT INTO user_reviews (
                rating, reason_ids, latitude, longitude, description,
                location_id, company_id, images, token_number,
                name, email, phone, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        ))
        .bind(request.rating)
        .bind(request.reason_ids)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.description.unwrap_or_default())
        .bind(request.location_id)
        .bind(request.company_id)
        .bind(images)
        .bind(String::from(token_number))
        .bind(request.name)
        .bind(request.email)
        .bind(request.phone)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("insert review"))?;

        let review = row.into_review()?;
        tracing::debug!(review_id = review.id, "Review stored");
        Ok(review)
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_reviews", db.operation = "select"))]
    async fn get(&self, id: i64) -> Result<Option<UserReview>, AppError> {
        sqlx::query_as::<Postgres, ReviewRow>(&format!(
            "SELECT {} FROM user_reviews WHERE id = $1",
            REVIEW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get review"))?
        .map(ReviewRow::into_review)
        .transpose()
    }

    #[tracing::instrument(skip(self, update), fields(db.table = "user_reviews", db.operation = "update"))]
    async fn update_contact(
        &self,
        id: i64,
        update: ContactUpdate,
    ) -> Result<Option<UserReview>, AppError> {
        sqlx::query_as::<Postgres, ReviewRow>(&format!(
            r#"
            UPDATE user_reviews
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.phone)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update review contact"))?
        .map(ReviewRow::into_review)
        .transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_reviews", db.operation = "select"))]
    async fn list(&self, filter: &ReviewFilter) -> Result<(Vec<UserReview>, usize), AppError> {
        let sql = list_sql(filter);
        let mut query = bind_filter(sqlx::query_as::<Postgres, ReviewRow>(&sql), filter);
        if let Some(limit) = filter.limit {
            query = query.bind(to_i64(limit));
        }
        if let Some(offset) = filter.offset {
            query = query.bind(to_i64(offset));
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list reviews"))?;

        let count = count_sql(filter);
        let (total,) = bind_filter(sqlx::query_as::<Postgres, (i64,)>(&count), filter)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count reviews"))?;

        let reviews = rows
            .into_iter()
            .map(ReviewRow::into_review)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((reviews, usize::try_from(total).unwrap_or(0)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_reviews", db.operation = "select"))]
    async fn ratings_for_location(&self, location_id: i64) -> Result<Vec<f64>, AppError> {
        sqlx::query_scalar::<Postgres, f64>("SELECT rating FROM user_reviews WHERE location_id = $1")
            .bind(location_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("location ratings"))
    }

    #[tracing::instrument(skip(self), fields(db.table = "user_reviews", db.operation = "select"))]
    async fn recent(&self, limit: usize) -> Result<Vec<UserReview>, AppError> {
        let rows = sqlx::query_as::<Postgres, ReviewRow>(&format!(
            "SELECT {} FROM user_reviews ORDER BY created_at DESC, id DESC LIMIT $1",
            REVIEW_COLUMNS
        ))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("recent reviews"))?;

        rows.into_iter().map(ReviewRow::into_review).collect()
    }

    #[tracing::instrument(skip(self, token), fields(db.table = "user_reviews", db.operation = "select"))]
    async fn token_exists(&self, token: &str) -> Result<bool, AppError> {
        sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_reviews WHERE token_number = $1)",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("token lookup"))
    }
}

#[async_trait]
impl TokenLookup for PgReviewRepository {
    async fn token_exists(&self, candidate: &str) -> anyhow::Result<bool> {
        Ok(ReviewRepository::token_exists(self, candidate).await?)
    }
}
