//! Rating submission and aggregate recomputation.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::{Rating, RatingDraft, RatingOutcome, RatingStats, MAX_RATING, MIN_RATING};
use crate::catalog_store::{CatalogStore, RatingStore};

#[derive(Debug, Error)]
pub enum SubmitRatingError {
    #[error("movie {0} not found")]
    MovieNotFound(i64),

    #[error("rating must be between {MIN_RATING} and {MAX_RATING}, got {0}")]
    ValueOutOfRange(i32),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Coordinates rating writes and keeps movie aggregates in sync.
///
/// The upsert and the aggregate recomputation that follows it form one
/// critical section per movie: submissions for the same movie serialize on a
/// per-movie lock, submissions for different movies proceed in parallel.
pub struct RatingService {
    catalog_store: Arc<dyn CatalogStore>,
    rating_store: Arc<dyn RatingStore>,
    movie_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl RatingService {
    pub fn new(catalog_store: Arc<dyn CatalogStore>, rating_store: Arc<dyn RatingStore>) -> Self {
        RatingService {
            catalog_store,
            rating_store,
            movie_locks: Mutex::new(HashMap::new()),
        }
    }

    fn movie_lock(&self, movie_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.movie_locks.lock().unwrap();
        locks.entry(movie_id).or_default().clone()
    }

    /// Creates or updates the caller's rating for a movie, then recomputes
    /// the movie's cached aggregates before returning.
    ///
    /// One rating per (movie, user): a resubmission mutates the existing
    /// record in place, preserving its id and creation timestamp.
    pub fn submit_rating(
        &self,
        movie_id: i64,
        user_id: usize,
        draft: RatingDraft,
    ) -> Result<(Rating, RatingOutcome), SubmitRatingError> {
        if !(MIN_RATING..=MAX_RATING).contains(&draft.rating) {
            return Err(SubmitRatingError::ValueOutOfRange(draft.rating));
        }

        let lock = self.movie_lock(movie_id);
        let _guard = lock.lock().unwrap();

        if self.catalog_store.get_movie(movie_id)?.is_none() {
            return Err(SubmitRatingError::MovieNotFound(movie_id));
        }

        let now = Utc::now();
        let (rating, outcome) = match self.rating_store.get_rating(movie_id, user_id)? {
            Some(existing) => {
                let updated = self.rating_store.update_rating(
                    existing.id,
                    draft.rating,
                    draft.review,
                    now,
                )?;
                (updated, RatingOutcome::Updated)
            }
            None => {
                let created = self.rating_store.insert_rating(
                    movie_id,
                    user_id,
                    draft.rating,
                    draft.review,
                    now,
                )?;
                (created, RatingOutcome::Created)
            }
        };

        self.recompute_locked(movie_id)?;

        Ok((rating, outcome))
    }

    /// Recomputes a movie's aggregates from a full scan of its ratings.
    ///
    /// Idempotent; a vanished movie makes this a no-op rather than an error.
    pub fn recompute_movie_stats(&self, movie_id: i64) -> Result<RatingStats> {
        let lock = self.movie_lock(movie_id);
        let _guard = lock.lock().unwrap();
        self.recompute_locked(movie_id)
    }

    fn recompute_locked(&self, movie_id: i64) -> Result<RatingStats> {
        let ratings = self.rating_store.movie_ratings(movie_id)?;
        let stats = RatingStats::from_ratings(&ratings);
        self.catalog_store
            .update_movie_rating_stats(movie_id, stats.count, stats.average)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Genre, InMemoryCatalogStore, NewMovie};

    fn service_with_movie() -> (Arc<InMemoryCatalogStore>, RatingService, i64) {
        let store = Arc::new(InMemoryCatalogStore::new());
        let movie = store
            .insert_movie(
                NewMovie {
                    title: "The Matrix".to_owned(),
                    description: "A hacker wakes up.".to_owned(),
                    genre: Genre::SciFi,
                    release_year: 1999,
                },
                1,
            )
            .unwrap();
        let service = RatingService::new(store.clone(), store.clone());
        (store, service, movie.id)
    }

    fn draft(rating: i32) -> RatingDraft {
        RatingDraft {
            rating,
            review: None,
        }
    }

    #[test]
    fn first_submission_creates_and_updates_aggregates() {
        let (store, service, movie_id) = service_with_movie();

        let (rating, outcome) = service.submit_rating(movie_id, 7, draft(5)).unwrap();
        assert_eq!(outcome, RatingOutcome::Created);
        assert_eq!(rating.rating, 5);
        assert_eq!(rating.created_at, rating.updated_at);

        let movie = store.get_movie(movie_id).unwrap().unwrap();
        assert_eq!(movie.ratings_count, 1);
        assert_eq!(movie.ratings_avg, 5.0);
    }

    #[test]
    fn resubmission_updates_in_place() {
        let (store, service, movie_id) = service_with_movie();

        let (first, _) = service
            .submit_rating(
                movie_id,
                7,
                RatingDraft {
                    rating: 5,
                    review: Some("masterpiece".to_owned()),
                },
            )
            .unwrap();
        let (second, outcome) = service.submit_rating(movie_id, 7, draft(3)).unwrap();

        assert_eq!(outcome, RatingOutcome::Updated);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.rating, 3);
        assert_eq!(second.review, None);

        // Still exactly one rating for (movie, user), and the aggregates
        // reflect the last submission
        assert_eq!(store.movie_ratings(movie_id).unwrap().len(), 1);
        let movie = store.get_movie(movie_id).unwrap().unwrap();
        assert_eq!(movie.ratings_count, 1);
        assert_eq!(movie.ratings_avg, 3.0);
    }

    #[test]
    fn ratings_from_different_users_aggregate_together() {
        let (store, service, movie_id) = service_with_movie();

        service.submit_rating(movie_id, 1, draft(5)).unwrap();
        service.submit_rating(movie_id, 2, draft(4)).unwrap();
        service.submit_rating(movie_id, 3, draft(4)).unwrap();

        let movie = store.get_movie(movie_id).unwrap().unwrap();
        assert_eq!(movie.ratings_count, 3);
        assert_eq!(movie.ratings_avg, 4.3);
    }

    #[test]
    fn aggregates_match_from_scratch_recomputation() {
        let (store, service, movie_id) = service_with_movie();

        for (user_id, value) in [(1, 5), (2, 2), (3, 4), (1, 1)] {
            service.submit_rating(movie_id, user_id, draft(value)).unwrap();
        }

        let movie = store.get_movie(movie_id).unwrap().unwrap();
        let expected = RatingStats::from_ratings(&store.movie_ratings(movie_id).unwrap());
        assert_eq!(movie.ratings_count, expected.count);
        assert_eq!(movie.ratings_avg, expected.average);
    }

    #[test]
    fn out_of_range_values_are_rejected_without_store_access() {
        let (store, service, movie_id) = service_with_movie();

        for bad in [0, 6, -1] {
            match service.submit_rating(movie_id, 1, draft(bad)) {
                Err(SubmitRatingError::ValueOutOfRange(value)) => assert_eq!(value, bad),
                other => panic!("expected ValueOutOfRange, got {:?}", other.map(|_| ())),
            }
        }
        assert!(store.movie_ratings(movie_id).unwrap().is_empty());
    }

    #[test]
    fn unknown_movie_is_rejected() {
        let (_store, service, _movie_id) = service_with_movie();
        match service.submit_rating(999, 1, draft(4)) {
            Err(SubmitRatingError::MovieNotFound(999)) => {}
            other => panic!("expected MovieNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn recompute_is_idempotent() {
        let (store, service, movie_id) = service_with_movie();
        service.submit_rating(movie_id, 1, draft(4)).unwrap();

        let first = service.recompute_movie_stats(movie_id).unwrap();
        let second = service.recompute_movie_stats(movie_id).unwrap();
        assert_eq!(first, second);

        let movie = store.get_movie(movie_id).unwrap().unwrap();
        assert_eq!(movie.ratings_count, 1);
        assert_eq!(movie.ratings_avg, 4.0);
    }

    #[test]
    fn recompute_for_vanished_movie_is_a_noop() {
        let (_store, service, _movie_id) = service_with_movie();
        let stats = service.recompute_movie_stats(12345).unwrap();
        assert_eq!(stats, RatingStats::empty());
    }

    #[test]
    fn concurrent_submissions_for_one_movie_keep_aggregates_consistent() {
        let (store, service, movie_id) = service_with_movie();
        let service = Arc::new(service);

        let handles: Vec<_> = (1..=8)
            .map(|user_id| {
                let service = service.clone();
                std::thread::spawn(move || {
                    service
                        .submit_rating(movie_id, user_id, draft((user_id % 5 + 1) as i32))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let movie = store.get_movie(movie_id).unwrap().unwrap();
        let expected = RatingStats::from_ratings(&store.movie_ratings(movie_id).unwrap());
        assert_eq!(movie.ratings_count, 8);
        assert_eq!(movie.ratings_avg, expected.average);
    }
}
