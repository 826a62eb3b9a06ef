//! Rating models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

/// A user's rating of a movie.
///
/// At most one rating exists per (movie, user) pair; resubmissions mutate the
/// record in place. `updated_at` equals `created_at` until the first
/// resubmission.
#[derive(Clone, Debug, Serialize)]
pub struct Rating {
    pub id: i64,
    pub movie_id: i64,
    pub user_id: usize,
    pub rating: i32,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rating submission payload.
#[derive(Clone, Debug, Deserialize)]
pub struct RatingDraft {
    pub rating: i32,
    pub review: Option<String>,
}

/// Whether a submission created a new rating or updated an existing one.
/// The HTTP boundary maps this to 201 vs 200.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatingOutcome {
    Created,
    Updated,
}

/// Aggregate rating statistics for one movie.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RatingStats {
    pub count: usize,
    pub average: f64,
}

impl RatingStats {
    pub fn empty() -> Self {
        RatingStats {
            count: 0,
            average: 0.0,
        }
    }

    /// Computes count and one-decimal mean from scratch.
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return RatingStats::empty();
        }
        let sum: i64 = ratings.iter().map(|r| r.rating as i64).sum();
        let average = (sum as f64 / ratings.len() as f64 * 10.0).round() / 10.0;
        RatingStats {
            count: ratings.len(),
            average,
        }
    }
}
