//! Test fixture creation for catalog and user databases.

use super::constants::*;
use anyhow::Result;
use reelrater_server::catalog_store::{CatalogStore, Genre, NewMovie, SqliteCatalogStore};
use reelrater_server::user::{SqliteUserStore, UserManager};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Movies seeded into the default test catalog. The release years
/// [1994, 1994, 1999, 2008, 2010] are relied on by the year-filter tests.
pub const SEED_MOVIES: &[(&str, &str, Genre, i32)] = &[
    (
        "The Shawshank Redemption",
        "Two imprisoned men bond over a number of years.",
        Genre::Drama,
        1994,
    ),
    (
        "Pulp Fiction",
        "The lives of two mob hitmen intertwine in four tales.",
        Genre::Crime,
        1994,
    ),
    (
        "The Matrix",
        "A computer hacker learns the true nature of his reality.",
        Genre::SciFi,
        1999,
    ),
    (
        "The Dark Knight",
        "Batman faces the Joker in Gotham.",
        Genre::Action,
        2008,
    ),
    (
        "Inception",
        "A thief plants an idea through shared dreams.",
        Genre::SciFi,
        2010,
    ),
];

/// Creates catalog and user databases in one temp directory.
///
/// The user database always contains TEST_USER and SECOND_USER; the catalog
/// is seeded with SEED_MOVIES when `seed_movies` is true.
pub fn create_test_databases(seed_movies: bool) -> Result<(TempDir, PathBuf, PathBuf)> {
    let dir = TempDir::new()?;
    let catalog_db_path = dir.path().join("catalog.db");
    let user_db_path = dir.path().join("user.db");

    let user_store = Arc::new(SqliteUserStore::new(&user_db_path)?);
    let manager = UserManager::new(user_store);
    let first_user_id = manager.register(TEST_USER, TEST_PASS)?;
    manager.register(SECOND_USER, SECOND_PASS)?;

    let catalog_store = SqliteCatalogStore::new(&catalog_db_path)?;
    if seed_movies {
        for (title, description, genre, year) in SEED_MOVIES {
            catalog_store.insert_movie(
                NewMovie {
                    title: (*title).to_owned(),
                    description: (*description).to_owned(),
                    genre: *genre,
                    release_year: *year,
                },
                first_user_id,
            )?;
        }
    }

    Ok((dir, catalog_db_path, user_db_path))
}
