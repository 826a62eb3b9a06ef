//! Store trait definitions.
//!
//! Both traits are implemented by `SqliteCatalogStore` (production) and
//! `InMemoryCatalogStore` (tests, ephemeral deployments), so the same core
//! logic runs against either backend.

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::models::{Movie, NewMovie};
use crate::ratings::Rating;

/// Movie storage.
pub trait CatalogStore: Send + Sync {
    /// Inserts a validated movie and returns the stored record, with its
    /// assigned id, creation timestamp, and zeroed aggregate fields.
    fn insert_movie(&self, movie: NewMovie, created_by: usize) -> Result<Movie>;

    /// Returns Ok(None) if the movie does not exist.
    fn get_movie(&self, movie_id: i64) -> Result<Option<Movie>>;

    /// Full snapshot in ascending id order.
    fn all_movies(&self) -> Result<Vec<Movie>>;

    /// Writes the cached aggregate fields. Returns false (not an error) if
    /// the movie does not exist.
    fn update_movie_rating_stats(&self, movie_id: i64, count: usize, average: f64)
        -> Result<bool>;

    fn movies_count(&self) -> Result<usize>;
}

/// Rating storage.
pub trait RatingStore: Send + Sync {
    /// Inserts a new rating with `created_at = updated_at = at`.
    fn insert_rating(
        &self,
        movie_id: i64,
        user_id: usize,
        rating: i32,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Rating>;

    /// The unique rating for (movie, user), if any.
    fn get_rating(&self, movie_id: i64, user_id: usize) -> Result<Option<Rating>>;

    /// Mutates value, review and `updated_at` in place, preserving id and
    /// `created_at`. Fails if the rating does not exist.
    fn update_rating(
        &self,
        rating_id: i64,
        rating: i32,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Rating>;

    /// All ratings referencing a movie, ascending id order.
    fn movie_ratings(&self, movie_id: i64) -> Result<Vec<Rating>>;

    /// All ratings submitted by a user, ascending id order.
    fn user_ratings(&self, user_id: usize) -> Result<Vec<Rating>>;
}
