//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is loaded first when
//! present) and validated once at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DB_MAX_CONNECTIONS, DB_TIMEOUT_SECS, MAX_COMPRESSED_IMAGE_BYTES, MAX_IMAGES_PER_REVIEW, REVIEW_IMAGE_FIELD, REVIEW_IMAGE_FOLDER,
    TOKEN_MAX_ATTEMPTS, UPLOAD_TIMEOUT_SECS,
};
use crate::models::FieldSpec;
use crate::storage_types::StorageBackend;

/// Review service configuration
#[derive(Clone, Debug)]
pub struct ReviewConfig {
    pub environment: String,
    // Database configuration. Reviews are kept in memory when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_secs: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, ...)
    pub s3_public_base_url: Option<String>, // CDN in front of the bucket
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Image intake
    pub image_max_bytes: usize,
    pub upload_timeout_secs: u64,
    pub review_image_folder: String,
    pub max_images_per_review: usize,
    // Token generation
    pub token_max_attempts: u32,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            db_timeout_secs: DB_TIMEOUT_SECS,
            storage_backend: StorageBackend::Memory,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            s3_public_base_url: None,
            aws_region: None,
            local_storage_path: None,
            local_storage_base_url: None,
            image_max_bytes: MAX_COMPRESSED_IMAGE_BYTES,
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            review_image_folder: REVIEW_IMAGE_FOLDER.to_string(),
            max_images_per_review: MAX_IMAGES_PER_REVIEW,
            token_max_attempts: TOKEN_MAX_ATTEMPTS,
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let config = ReviewConfig {
            environment,
            database_url: env_opt("DATABASE_URL"),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            db_timeout_secs: env_or("DB_TIMEOUT_SECONDS", DB_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_public_base_url: env_opt("S3_PUBLIC_BASE_URL"),
            aws_region: env_opt("AWS_REGION"),
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            local_storage_base_url: env_opt("LOCAL_STORAGE_BASE_URL"),
            image_max_bytes: env_or("IMAGE_MAX_BYTES", MAX_COMPRESSED_IMAGE_BYTES),
            upload_timeout_secs: env_or("UPLOAD_TIMEOUT_SECONDS", UPLOAD_TIMEOUT_SECS),
            review_image_folder: env_opt("REVIEW_IMAGE_FOLDER")
                .unwrap_or_else(|| REVIEW_IMAGE_FOLDER.to_string()),
            max_images_per_review: env_or("MAX_IMAGES_PER_REVIEW", MAX_IMAGES_PER_REVIEW),
            token_max_attempts: env_or("TOKEN_MAX_ATTEMPTS", TOKEN_MAX_ATTEMPTS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    /// Field descriptor for review photos.
    pub fn review_image_field(&self) -> FieldSpec {
        FieldSpec::new(
            REVIEW_IMAGE_FIELD,
            self.review_image_folder.clone(),
            self.max_images_per_review,
        )
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.image_max_bytes == 0 {
            return Err(anyhow::anyhow!("IMAGE_MAX_BYTES must be greater than 0"));
        }

        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_TIMEOUT_SECONDS must be greater than 0"
            ));
        }

        if self.token_max_attempts == 0 {
            return Err(anyhow::anyhow!("TOKEN_MAX_ATTEMPTS must be greater than 0"));
        }

        if self.max_images_per_review == 0 {
            return Err(anyhow::anyhow!(
                "MAX_IMAGES_PER_REVIEW must be greater than 0"
            ));
        }

        match &self.database_url {
            Some(url) => {
                if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ));
                }
                if self.db_max_connections == 0 {
                    return Err(anyhow::anyhow!(
                        "DB_MAX_CONNECTIONS must be greater than 0"
                    ));
                }
            }
            None if self.is_production() => {
                return Err(anyhow::anyhow!("DATABASE_URL must be set in production"));
            }
            None => {}
        }

        let folder = self.review_image_folder.trim_matches('/');
        if folder.is_empty() || folder.contains("..") || self.review_image_folder.starts_with('/')
        {
            return Err(anyhow::anyhow!(
                "REVIEW_IMAGE_FOLDER must be a relative folder without '..'"
            ));
        }

        // Validate storage backend configuration
        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        Ok(())
    }
}
