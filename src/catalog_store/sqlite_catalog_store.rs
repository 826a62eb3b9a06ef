//! SQLite-backed catalog and rating storage.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::models::{Genre, Movie, NewMovie};
use super::schema::{CATALOG_VERSIONED_SCHEMAS, MOVIE_TABLE_V_0, RATING_TABLE_V_0};
use super::trait_def::{CatalogStore, RatingStore};
use crate::ratings::Rating;
use crate::sqlite_persistence::BASE_DB_VERSION;

#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(db_path)?;
            CATALOG_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
            conn
        };
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read catalog database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Catalog database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;

        if version >= CATALOG_VERSIONED_SCHEMAS.len() {
            bail!("Catalog database version {} is too new", version);
        }
        CATALOG_VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get catalog schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let mut latest_from = version;
        for schema in CATALOG_VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating catalog db from version {} to {}",
                    latest_from, schema.version
                );
                migration_fn(conn)?;
                latest_from = schema.version;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        Ok(())
    }
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    let genre_str: String = row.get(3)?;
    let created_secs: i64 = row.get(6)?;
    Ok(Movie {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        genre: Genre::parse(&genre_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown genre '{}'", genre_str).into(),
            )
        })?,
        release_year: row.get(4)?,
        created_by: row.get::<_, i64>(5)? as usize,
        created_at: DateTime::from_timestamp(created_secs, 0).unwrap_or_default(),
        ratings_count: row.get::<_, i64>(7)? as usize,
        ratings_avg: row.get(8)?,
    })
}

const MOVIE_COLUMNS: &str =
    "id, title, description, genre, release_year, created_by, created, ratings_count, ratings_avg";

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    let created_secs: i64 = row.get(5)?;
    let updated_secs: i64 = row.get(6)?;
    Ok(Rating {
        id: row.get(0)?,
        movie_id: row.get(1)?,
        user_id: row.get::<_, i64>(2)? as usize,
        rating: row.get(3)?,
        review: row.get(4)?,
        created_at: DateTime::from_timestamp(created_secs, 0).unwrap_or_default(),
        updated_at: DateTime::from_timestamp(updated_secs, 0).unwrap_or_default(),
    })
}

const RATING_COLUMNS: &str = "id, movie_id, user_id, rating, review, created, updated";

impl CatalogStore for SqliteCatalogStore {
    fn insert_movie(&self, movie: NewMovie, created_by: usize) -> Result<Movie> {
        let conn = self.conn.lock().unwrap();
        let created = Utc::now();
        conn.execute(
            &format!(
                "INSERT INTO {} (title, description, genre, release_year, created_by, created, \
                 ratings_count, ratings_avg) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0.0)",
                MOVIE_TABLE_V_0.name
            ),
            params![
                movie.title,
                movie.description,
                movie.genre.as_str(),
                movie.release_year,
                created_by as i64,
                created.timestamp(),
            ],
        )
        .with_context(|| format!("Failed to insert movie '{}'", movie.title))?;
        let id = conn.last_insert_rowid();

        Ok(Movie {
            id,
            title: movie.title,
            description: movie.description,
            genre: movie.genre,
            release_year: movie.release_year,
            created_by,
            created_at: DateTime::from_timestamp(created.timestamp(), 0).unwrap_or_default(),
            ratings_count: 0,
            ratings_avg: 0.0,
        })
    }

    fn get_movie(&self, movie_id: i64) -> Result<Option<Movie>> {
        let conn = self.conn.lock().unwrap();
        let movie = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    MOVIE_COLUMNS, MOVIE_TABLE_V_0.name
                ),
                params![movie_id],
                movie_from_row,
            )
            .optional()?;
        Ok(movie)
    }

    fn all_movies(&self) -> Result<Vec<Movie>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            MOVIE_COLUMNS, MOVIE_TABLE_V_0.name
        ))?;
        let movies = stmt
            .query_map([], movie_from_row)?
            .collect::<Result<Vec<Movie>, _>>()?;
        Ok(movies)
    }

    fn update_movie_rating_stats(
        &self,
        movie_id: i64,
        count: usize,
        average: f64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET ratings_count = ?1, ratings_avg = ?2 WHERE id = ?3",
                MOVIE_TABLE_V_0.name
            ),
            params![count as i64, average, movie_id],
        )?;
        Ok(changed > 0)
    }

    fn movies_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", MOVIE_TABLE_V_0.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl RatingStore for SqliteCatalogStore {
    fn insert_rating(
        &self,
        movie_id: i64,
        user_id: usize,
        rating: i32,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Rating> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (movie_id, user_id, rating, review, created, updated) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                RATING_TABLE_V_0.name
            ),
            params![
                movie_id,
                user_id as i64,
                rating,
                review,
                at.timestamp()
            ],
        )
        .with_context(|| {
            format!(
                "Failed to insert rating for movie {} by user {}",
                movie_id, user_id
            )
        })?;
        let id = conn.last_insert_rowid();
        let at = DateTime::from_timestamp(at.timestamp(), 0).unwrap_or_default();

        Ok(Rating {
            id,
            movie_id,
            user_id,
            rating,
            review,
            created_at: at,
            updated_at: at,
        })
    }

    fn get_rating(&self, movie_id: i64, user_id: usize) -> Result<Option<Rating>> {
        let conn = self.conn.lock().unwrap();
        let rating = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE movie_id = ?1 AND user_id = ?2",
                    RATING_COLUMNS, RATING_TABLE_V_0.name
                ),
                params![movie_id, user_id as i64],
                rating_from_row,
            )
            .optional()?;
        Ok(rating)
    }

    fn update_rating(
        &self,
        rating_id: i64,
        rating: i32,
        review: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Rating> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET rating = ?1, review = ?2, updated = ?3 WHERE id = ?4",
                RATING_TABLE_V_0.name
            ),
            params![rating, review, at.timestamp(), rating_id],
        )?;
        if changed == 0 {
            bail!("rating {} does not exist", rating_id);
        }

        let updated = conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                RATING_COLUMNS, RATING_TABLE_V_0.name
            ),
            params![rating_id],
            rating_from_row,
        )?;
        Ok(updated)
    }

    fn movie_ratings(&self, movie_id: i64) -> Result<Vec<Rating>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE movie_id = ?1 ORDER BY id ASC",
            RATING_COLUMNS, RATING_TABLE_V_0.name
        ))?;
        let ratings = stmt
            .query_map(params![movie_id], rating_from_row)?
            .collect::<Result<Vec<Rating>, _>>()?;
        Ok(ratings)
    }

    fn user_ratings(&self, user_id: usize) -> Result<Vec<Rating>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE user_id = ?1 ORDER BY id ASC",
            RATING_COLUMNS, RATING_TABLE_V_0.name
        ))?;
        let ratings = stmt
            .query_map(params![user_id as i64], rating_from_row)?
            .collect::<Result<Vec<Rating>, _>>()?;
        Ok(ratings)
    }
}
