//! Database setup and repository selection

use crate::db::postgres::PgReviewRepository;
use crate::db::review::{InMemoryReviewRepository, ReviewRepository};
use anyhow::Context;
use sitereview_core::{AppError, Clock, ReviewConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Connect to `database_url` and apply pending migrations.
pub async fn setup_database(config: &ReviewConfig, database_url: &str) -> anyhow::Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout())
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Review repository for `config`: PostgreSQL when `DATABASE_URL` is set,
/// process memory otherwise.
pub async fn create_review_repository(
    config: &ReviewConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn ReviewRepository>, AppError> {
    match config.database_url.as_deref() {
        Some(database_url) => {
            tracing::info!("Initializing PostgreSQL review repository");
            let pool = setup_database(config, database_url).await?;
            Ok(Arc::new(PgReviewRepository::with_clock(pool, clock)))
        }
        None if config.is_production() => Err(AppError::Internal(
            "DATABASE_URL must be set in production".to_string(),
        )),
        None => {
            tracing::warn!("DATABASE_URL not set, reviews are kept in memory only");
            Ok(Arc::new(InMemoryReviewRepository::with_clock(clock)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitereview_core::{CreateReviewRequest, FixedClock, NewReviewRecord, ReviewToken};

    #[tokio::test]
    async fn without_database_url_reviews_stay_in_memory() {
        let repo = create_review_repository(
            &ReviewConfig::default(),
            Arc::new(FixedClock::from_millis(0)),
        )
        .await
        .unwrap();

        let created = repo
            .create(NewReviewRecord {
                request: CreateReviewRequest {
                    rating: 4.0,
                    ..CreateReviewRequest::default()
                },
                images: vec![],
                token_number: ReviewToken::from_number(424242).unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(created.id, 1);
        assert!(repo.token_exists("424242").await.unwrap());
    }

    #[tokio::test]
    async fn production_refuses_memory_repository() {
        let config = ReviewConfig {
            environment: "production".to_string(),
            ..ReviewConfig::default()
        };
        let result = create_review_repository(&config, Arc::new(FixedClock::from_millis(0))).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn unreachable_database_is_reported() {
        let config = ReviewConfig {
            // port 1 is never a PostgreSQL server
            database_url: Some("postgres://sitereview@127.0.0.1:1/reviews".to_string()),
            db_timeout_secs: 1,
            ..ReviewConfig::default()
        };
        let result = create_review_repository(&config, Arc::new(FixedClock::from_millis(0))).await;
        assert!(matches!(result, Err(AppError::InternalWithSource { .. })));
    }
}
