use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, SqlType, Table, VersionedSchema, BASE_DB_VERSION, DEFAULT_TIMESTAMP,
};
use crate::user::auth::{AuthToken, AuthTokenValue, UserAuthCredentials};
use crate::user::user_store::{UserAuthCredentialsStore, UserAuthTokenStore, UserStore};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::info;

use super::auth::{ReelraterHasher, UsernamePasswordCredentials};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};

const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            references = Some("user(id)")
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};

const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            references = Some("user(id)")
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_tried", &SqlType::Integer),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const USER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE_V_0,
        AUTH_TOKEN_TABLE_V_0,
        USER_PASSWORD_CREDENTIALS_V_0,
    ],
    migration: None,
}];

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn from_unix_seconds(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
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
            USER_VERSIONED_SCHEMAS.last().unwrap().create(&conn)?;
            conn
        };
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read user database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "User database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;

        if version >= USER_VERSIONED_SCHEMAS.len() {
            bail!("User database version {} is too new", version);
        }
        USER_VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get user schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let mut latest_from = version;
        for schema in USER_VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating user db from version {} to {}",
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

impl UserStore for SqliteUserStore {
    fn create_user(&self, user_handle: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("INSERT INTO {} (handle) VALUES (?1)", USER_TABLE_V_0.name),
            params![user_handle],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let handle = conn
            .query_row(
                &format!("SELECT handle FROM {} WHERE id = ?1", USER_TABLE_V_0.name),
                params![user_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(handle)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let id: Option<i64> = conn
            .query_row(
                &format!("SELECT id FROM {} WHERE handle = ?1", USER_TABLE_V_0.name),
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(|id| id as usize))
    }

    fn get_all_user_handles(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT handle FROM {} ORDER BY id ASC",
            USER_TABLE_V_0.name
        ))?;
        let handles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(handles)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_user_auth_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        let conn = self.conn.lock().unwrap();
        struct CredentialsRow {
            user_id: i64,
            salt: String,
            hash: String,
            hasher: String,
            created: i64,
            last_tried: Option<i64>,
            last_used: Option<i64>,
        }
        let row = conn
            .query_row(
                &format!(
                    "SELECT c.user_id, c.salt, c.hash, c.hasher, c.created, c.last_tried, \
                     c.last_used FROM {} c JOIN {} u ON u.id = c.user_id WHERE u.handle = ?1",
                    USER_PASSWORD_CREDENTIALS_V_0.name, USER_TABLE_V_0.name
                ),
                params![user_handle],
                |row| {
                    Ok(CredentialsRow {
                        user_id: row.get(0)?,
                        salt: row.get(1)?,
                        hash: row.get(2)?,
                        hasher: row.get(3)?,
                        created: row.get(4)?,
                        last_tried: row.get(5)?,
                        last_used: row.get(6)?,
                    })
                },
            )
            .optional()?;

        match row {
            Some(row) => {
                let hasher = ReelraterHasher::from_str(&row.hasher)?;
                Ok(Some(UserAuthCredentials {
                    user_id: row.user_id as usize,
                    username_password: Some(UsernamePasswordCredentials {
                        user_id: row.user_id as usize,
                        salt: row.salt,
                        hash: row.hash,
                        hasher,
                        created: from_unix_seconds(row.created),
                        last_tried: row.last_tried.map(from_unix_seconds),
                        last_used: row.last_used.map(from_unix_seconds),
                    }),
                }))
            }
            None => {
                // User might exist without password credentials
                let user_id: Option<i64> = conn
                    .query_row(
                        &format!("SELECT id FROM {} WHERE handle = ?1", USER_TABLE_V_0.name),
                        params![user_handle],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(user_id.map(|user_id| UserAuthCredentials {
                    user_id: user_id as usize,
                    username_password: None,
                }))
            }
        }
    }

    fn update_user_auth_credentials(&self, credentials: UserAuthCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE user_id = ?1",
                USER_PASSWORD_CREDENTIALS_V_0.name
            ),
            params![credentials.user_id as i64],
        )?;

        if let Some(password) = credentials.username_password {
            conn.execute(
                &format!(
                    "INSERT INTO {} (user_id, salt, hash, hasher, created, last_tried, last_used) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    USER_PASSWORD_CREDENTIALS_V_0.name
                ),
                params![
                    credentials.user_id as i64,
                    password.salt,
                    password.hash,
                    password.hasher.to_string(),
                    unix_seconds(password.created),
                    password.last_tried.map(unix_seconds),
                    password.last_used.map(unix_seconds),
                ],
            )?;
        }
        Ok(())
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                &format!(
                    "SELECT user_id, value, created, last_used FROM {} WHERE value = ?1",
                    AUTH_TOKEN_TABLE_V_0.name
                ),
                params![token.0],
                |row| {
                    Ok(AuthToken {
                        user_id: row.get::<_, i64>(0)? as usize,
                        value: AuthTokenValue(row.get(1)?),
                        created: from_unix_seconds(row.get(2)?),
                        last_used: row.get::<_, Option<i64>>(3)?.map(from_unix_seconds),
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let existing = self.get_user_auth_token(token)?;
        if existing.is_some() {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE value = ?1",
                    AUTH_TOKEN_TABLE_V_0.name
                ),
                params![token.0],
            )?;
        }
        Ok(existing)
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE {} SET last_used = ?1 WHERE value = ?2",
                AUTH_TOKEN_TABLE_V_0.name
            ),
            params![unix_seconds(SystemTime::now()), token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (user_id, value, created, last_used) VALUES (?1, ?2, ?3, ?4)",
                AUTH_TOKEN_TABLE_V_0.name
            ),
            params![
                token.user_id as i64,
                token.value.0,
                unix_seconds(token.created),
                token.last_used.map(unix_seconds),
            ],
        )?;
        Ok(())
    }
}
