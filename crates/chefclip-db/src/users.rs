//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub nickname: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, email, nickname, is_active, created_at, updated_at";

/// Creates a user and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including unique
/// constraint violations on `email`).
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    nickname: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, nickname) VALUES ($1, $2) RETURNING {COLUMNS}"
    ))
    .bind(email)
    .bind(nickname)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a user by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Partially updates a user; `None` fields keep their current value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no user exists with the given id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_user(
    pool: &PgPool,
    id: i64,
    email: Option<&str>,
    nickname: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET \
             email = COALESCE($2, email), \
             nickname = COALESCE($3, nickname), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(email)
    .bind(nickname)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Deletes a user. Request-history rows cascade. Returns `true` if a row was
/// removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_user(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
