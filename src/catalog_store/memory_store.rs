//! In-memory catalog and rating storage.
//!
//! Arena-style: records live in guarded vectors with store-assigned ids, and
//! every read hands out an owned copy so callers never alias stored state.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::models::{Movie, NewMovie};
use super::trait_def::{CatalogStore, RatingStore};
use crate::ratings::Rating;

#[derive(Default)]
struct Arena {
    movies: Vec<Movie>,
    ratings: Vec<Rating>,
    next_movie_id: i64,
    next_rating_id: i64,
}

#[derive(Default)]
pub struct InMemoryCatalogStore {
    arena: Mutex<Arena>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn insert_movie(&self, movie: NewMovie, created_by: usize) -> Result<Movie> {
        let mut arena = self.arena.lock().unwrap();
        arena.next_movie_id += 1;
        let movie = Movie {
            id: arena.next_movie_id,
            title: movie.title,
            description: movie.description,
            genre: movie.genre,
            release_year: movie.release_year,
            created_by,
            created_at: Utc::now(),
            ratings_count: 0,
            ratings_avg: 0.0,
        };
        arena.movies.push(movie.clone());
        Ok(movie)
    }

    fn get_movie(&self, movie_id: i64) -> Result<Option<Movie>> {
        let arena = self.arena.lock().unwrap();
        Ok(arena.movies.iter().find(|m| m.id == movie_id).cloned())
    }

    fn all_movies(&self) -> Result<Vec<Movie>> {
        // Movies are appended with increasing ids, so the vector is already
        // in id order.
        Ok(self.arena.lock().unwrap().movies.clone())
    }

    fn update_movie_rating_stats(
        &self,
        movie_id: i64,
        count: usize,
        average: f64,
    ) -> Result<bool> {
        let mut arena = self.arena.lock().unwrap();
        match arena.movies.iter_mut().find(|m| m.id == movie_id) {
            Some(movie) => {
                movie.ratings_count = count;
                movie.ratings_avg = average;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn movies_count(&self) -> Result<usize> {
        Ok(self.arena.lock().unwrap().movies.len())
    }
}

impl RatingStore for InMemoryCatalogStore {
    fn insert_rating(
        &self,
        movie_id: i64,
        user_id: usize,
        rating: i32,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Rating> {
        let mut arena = self.arena.lock().unwrap();
        if arena
            .ratings
            .iter()
            .any(|r| r.movie_id == movie_id && r.user_id == user_id)
        {
            bail!(
                "rating for movie {} by user {} already exists",
                movie_id,
                user_id
            );
        }
        arena.next_rating_id += 1;
        let rating = Rating {
            id: arena.next_rating_id,
            movie_id,
            user_id,
            rating,
            review,
            created_at: at,
            updated_at: at,
        };
        arena.ratings.push(rating.clone());
        Ok(rating)
    }

    fn get_rating(&self, movie_id: i64, user_id: usize) -> Result<Option<Rating>> {
        let arena = self.arena.lock().unwrap();
        Ok(arena
            .ratings
            .iter()
            .find(|r| r.movie_id == movie_id && r.user_id == user_id)
            .cloned())
    }

    fn update_rating(
        &self,
        rating_id: i64,
        rating: i32,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Rating> {
        let mut arena = self.arena.lock().unwrap();
        match arena.ratings.iter_mut().find(|r| r.id == rating_id) {
            Some(stored) => {
                stored.rating = rating;
                stored.review = review;
                stored.updated_at = at;
                Ok(stored.clone())
            }
            None => bail!("rating {} does not exist", rating_id),
        }
    }

    fn movie_ratings(&self, movie_id: i64) -> Result<Vec<Rating>> {
        let arena = self.arena.lock().unwrap();
        Ok(arena
            .ratings
            .iter()
            .filter(|r| r.movie_id == movie_id)
            .cloned()
            .collect())
    }

    fn user_ratings(&self, user_id: usize) -> Result<Vec<Rating>> {
        let arena = self.arena.lock().unwrap();
        Ok(arena
            .ratings
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
