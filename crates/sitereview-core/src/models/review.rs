use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use validator::Validate;

use super::token::ReviewToken;

/// A persisted user review of a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReview {
    pub id: i64,
    pub rating: f64,
    pub reason_ids: Vec<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub location_id: Option<i64>,
    pub company_id: Option<i64>,
    pub images: Vec<String>,
    pub token_number: ReviewToken,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review payload as submitted by a user, before images and token are attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: f64,
    #[serde(default)]
    pub reason_ids: Vec<i64>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub location_id: Option<i64>,
    pub company_id: Option<i64>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
}

/// Everything the repository needs to insert a review.
#[derive(Debug, Clone)]
pub struct NewReviewRecord {
    pub request: CreateReviewRequest,
    pub images: Vec<String>,
    pub token_number: ReviewToken,
}

/// Contact details a submitter may add after the fact.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ContactUpdate {
    #[validate(length(max = 120))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl ContactUpdate {
    /// Drops blank values so they never overwrite stored details.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            name: keep(self.name),
            email: keep(self.email),
            phone: keep(self.phone),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Rating,
}

impl FromStr for ReviewSortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created_at" => Ok(ReviewSortField::CreatedAt),
            "updated_at" => Ok(ReviewSortField::UpdatedAt),
            "rating" => Ok(ReviewSortField::Rating),
            _ => Err(anyhow::anyhow!("Invalid sort field: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(anyhow::anyhow!("Invalid sort order: {}", s)),
        }
    }
}

/// Optional filters and pagination for review listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewFilter {
    pub location_id: Option<i64>,
    pub company_id: Option<i64>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[serde(default)]
    pub sort_by: ReviewSortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl ReviewFilter {
    pub fn matches(&self, review: &UserReview) -> bool {
        if self.location_id.is_some() && review.location_id != self.location_id {
            return false;
        }
        if self.company_id.is_some() && review.company_id != self.company_id {
            return false;
        }
        if let Some(min) = self.min_rating {
            if review.rating < min {
                return false;
            }
        }
        if let Some(max) = self.max_rating {
            if review.rating > max {
                return false;
            }
        }
        true
    }

    /// Ordering of two reviews according to `sort_by` and `order`.
    pub fn compare(&self, a: &UserReview, b: &UserReview) -> Ordering {
        let ordering = match self.sort_by {
            ReviewSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            ReviewSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            ReviewSortField::Rating => a.rating.total_cmp(&b.rating),
        }
        // ids break ties so paging is stable
        .then_with(|| a.id.cmp(&b.id));

        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// One page of a review listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPage {
    pub data: Vec<UserReview>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
