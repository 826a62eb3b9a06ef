//! Catalog database schema (movies and ratings).

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

/// V 0
pub const MOVIE_TABLE_V_0: Table = Table {
    name: "movie",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
        sqlite_column!("release_year", &SqlType::Integer, non_null = true),
        sqlite_column!("created_by", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("ratings_count", &SqlType::Integer, non_null = true),
        sqlite_column!("ratings_avg", &SqlType::Real, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_movie_genre", "genre"),
        ("idx_movie_release_year", "release_year"),
    ],
};

pub const RATING_TABLE_V_0: Table = Table {
    name: "rating",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!(
            "movie_id",
            &SqlType::Integer,
            non_null = true,
            references = Some("movie(id)")
        ),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("rating", &SqlType::Integer, non_null = true),
        sqlite_column!("review", &SqlType::Text),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!("updated", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[&["movie_id", "user_id"]],
    indices: &[
        ("idx_rating_movie_id", "movie_id"),
        ("idx_rating_user_id", "user_id"),
    ],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[MOVIE_TABLE_V_0, RATING_TABLE_V_0],
    migration: None,
}];
