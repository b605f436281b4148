//! User records.
//!
//! Users are only ever referenced by id as owners; this module creates
//! them (for the CLI and tests) and looks them up.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::models::{ts_to_datetime, User};

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        created_at: ts_to_datetime(row.get("created_at")),
    }
}

/// Returns the user with `username`, creating it when absent.
pub async fn ensure_user(pool: &SqlitePool, username: &str, name: &str) -> Result<User> {
    if let Some(existing) = find_user_by_username(pool, username).await? {
        return Ok(existing);
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp_millis();

    sqlx::query(
        "INSERT INTO users (id, name, username, created_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(username) DO NOTHING",
    )
    .bind(&id)
    .bind(name)
    .bind(username)
    .bind(now)
    .execute(pool)
    .await?;

    find_user_by_username(pool, username)
        .await?
        .ok_or_else(|| ServiceError::not_found("user", username))
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, name, username, created_at FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}
