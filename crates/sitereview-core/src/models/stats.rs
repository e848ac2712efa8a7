use serde::Serialize;
use std::collections::BTreeMap;

/// Rating summary for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total_reviews: usize,
    /// Mean rating rounded to two decimals; 0 when there are no reviews.
    pub average_rating: f64,
    /// Count of reviews per star (1..=5) after rounding each rating.
    pub rating_distribution: BTreeMap<u8, usize>,
}

impl ReviewStats {
    pub fn from_ratings(ratings: &[f64]) -> Self {
        let total_reviews = ratings.len();
        let average_rating = if total_reviews > 0 {
            let mean = ratings.iter().sum::<f64>() / total_reviews as f64;
            (mean * 100.0).round() / 100.0
        } else {
            0.0
        };

        let mut rating_distribution: BTreeMap<u8, usize> = (1..=5).map(|star| (star, 0)).collect();
        for rating in ratings {
            let star = rating.round();
            if (1.0..=5.0).contains(&star) {
                *rating_distribution.entry(star as u8).or_insert(0) += 1;
            }
        }

        Self {
            total_reviews,
            average_rating,
            rating_distribution,
        }
    }
}
