//! Database operations for the `user_recipe_requests` table — one row per
//! (user, recipe) pair with touch semantics on repeat requests.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::recipes::RecipeRow;
use crate::DbError;

/// A row from the `user_recipe_requests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecipeRequestRow {
    pub id: Uuid,
    pub user_id: i64,
    pub recipe_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, user_id, recipe_id, created_at, updated_at";

const RECIPE_COLUMNS: &str =
    "r.id, r.video_id, r.status, r.title, r.description, r.steps, r.ingredients, \
     r.nutrition, r.categories, r.tags, r.difficulty, r.estimated_time_minutes, \
     r.servings, r.error_message, r.created_at, r.updated_at";

/// Records a request: first request inserts, repeat requests only advance
/// `updated_at` (`created_at` never changes). The `(user_id, recipe_id)`
/// unique constraint makes this a single atomic upsert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn touch_recipe_request(
    pool: &PgPool,
    user_id: i64,
    recipe_id: Uuid,
) -> Result<RecipeRequestRow, DbError> {
    let row = sqlx::query_as::<_, RecipeRequestRow>(&format!(
        "INSERT INTO user_recipe_requests (id, user_id, recipe_id) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, recipe_id) DO UPDATE SET updated_at = NOW() \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches the request row for a (user, recipe) pair, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_recipe_request(
    pool: &PgPool,
    user_id: i64,
    recipe_id: Uuid,
) -> Result<Option<RecipeRequestRow>, DbError> {
    let row = sqlx::query_as::<_, RecipeRequestRow>(&format!(
        "SELECT {COLUMNS} FROM user_recipe_requests \
         WHERE user_id = $1 AND recipe_id = $2"
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns a user's request rows, most recently touched first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_requests_by_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<RecipeRequestRow>, DbError> {
    let rows = sqlx::query_as::<_, RecipeRequestRow>(&format!(
        "SELECT {COLUMNS} FROM user_recipe_requests \
         WHERE user_id = $1 \
         ORDER BY updated_at DESC \
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the recipes a user has requested, most recently touched first.
///
/// The inner join drops requests whose recipe has been deleted, which is the
/// filtering the read side relies on.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_requested_recipes_by_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<RecipeRow>, DbError> {
    let rows = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {RECIPE_COLUMNS} \
         FROM user_recipe_requests q \
         JOIN recipes r ON r.id = q.recipe_id \
         WHERE q.user_id = $1 \
         ORDER BY q.updated_at DESC \
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Same as [`list_requested_recipes_by_user`], restricted to requests
/// touched within the last `days` days.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_requested_recipes_by_user(
    pool: &PgPool,
    user_id: i64,
    days: i32,
    limit: i64,
) -> Result<Vec<RecipeRow>, DbError> {
    let rows = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {RECIPE_COLUMNS} \
         FROM user_recipe_requests q \
         JOIN recipes r ON r.id = q.recipe_id \
         WHERE q.user_id = $1 \
           AND q.updated_at >= NOW() - make_interval(days => $2) \
         ORDER BY q.updated_at DESC \
         LIMIT $3"
    ))
    .bind(user_id)
    .bind(days)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
