//! Database operations for the `recipes` table — one status-tracked
//! extraction job per video.
//!
//! Status transitions are guarded updates: the `WHERE status = $expected`
//! clause is the arbiter, and `rows_affected == 0` becomes a typed
//! transition error. `processing` and `completed` jobs are never restarted;
//! only `failed → processing` re-entry is allowed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Recipe job status.
///
/// `pending → processing → {completed | failed}`; `failed → processing` on
/// retry; `completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for RecipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecipeStatus::Pending => write!(f, "pending"),
            RecipeStatus::Processing => write!(f, "processing"),
            RecipeStatus::Completed => write!(f, "completed"),
            RecipeStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RecipeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipeStatus::Pending),
            "processing" => Ok(RecipeStatus::Processing),
            "completed" => Ok(RecipeStatus::Completed),
            "failed" => Ok(RecipeStatus::Failed),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `recipes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub video_id: String,
    pub status: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub steps: Option<serde_json::Value>,
    pub ingredients: Option<serde_json::Value>,
    pub nutrition: Option<serde_json::Value>,
    pub categories: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
    pub difficulty: Option<String>,
    pub estimated_time_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipeRow {
    /// Parsed status; unknown strings map to `Pending`.
    #[must_use]
    pub fn status(&self) -> RecipeStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Category list as strings, tolerating an absent or malformed column.
    #[must_use]
    pub fn category_list(&self) -> Vec<String> {
        self.categories
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(ToOwned::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The full extracted field set written alongside `status = completed` in a
/// single atomic update.
#[derive(Debug, Clone)]
pub struct CompletedRecipeFields {
    pub title: String,
    pub description: Option<String>,
    pub steps: serde_json::Value,
    pub ingredients: serde_json::Value,
    pub nutrition: Option<serde_json::Value>,
    pub categories: serde_json::Value,
    pub tags: serde_json::Value,
    pub difficulty: Option<String>,
    pub estimated_time_minutes: Option<i32>,
    pub servings: Option<i32>,
}

const COLUMNS: &str = "id, video_id, status, title, description, steps, ingredients, nutrition, \
     categories, tags, difficulty, estimated_time_minutes, servings, \
     error_message, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Attempts to create a job in `processing` state for a video.
///
/// Returns `None` when another request created the job first (the unique
/// constraint on `video_id` arbitrates the race) — the caller re-reads the
/// existing row and must not treat the conflict as an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn insert_processing_recipe(
    pool: &PgPool,
    video_id: &str,
) -> Result<Option<RecipeRow>, DbError> {
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "INSERT INTO recipes (id, video_id, status) \
         VALUES ($1, $2, 'processing') \
         ON CONFLICT (video_id) DO NOTHING \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(video_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches a job by its video id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_recipe_by_video_id(
    pool: &PgPool,
    video_id: &str,
) -> Result<Option<RecipeRow>, DbError> {
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {COLUMNS} FROM recipes WHERE video_id = $1"
    ))
    .bind(video_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches a job by its UUID, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_recipe_by_id(pool: &PgPool, id: Uuid) -> Result<Option<RecipeRow>, DbError> {
    let row =
        sqlx::query_as::<_, RecipeRow>(&format!("SELECT {COLUMNS} FROM recipes WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Re-enters a failed job: clears the error message and moves it back to
/// `processing`, returning the updated row.
///
/// # Errors
///
/// Returns [`DbError::InvalidRecipeTransition`] if the job is not in
/// `failed` state, or [`DbError::Sqlx`] if the update fails.
pub async fn retry_failed_recipe(pool: &PgPool, id: Uuid) -> Result<RecipeRow, DbError> {
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "UPDATE recipes \
         SET status = 'processing', error_message = NULL, updated_at = NOW() \
         WHERE id = $1 AND status = 'failed' \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidRecipeTransition {
        id,
        expected_status: "failed",
    })?;

    Ok(row)
}

/// Moves a pending job to `processing`, returning the updated row.
///
/// Jobs are normally created directly in `processing`; this covers rows that
/// still sit at the schema default.
///
/// # Errors
///
/// Returns [`DbError::InvalidRecipeTransition`] if the job is not in
/// `pending` state, or [`DbError::Sqlx`] if the update fails.
pub async fn activate_pending_recipe(pool: &PgPool, id: Uuid) -> Result<RecipeRow, DbError> {
    let row = sqlx::query_as::<_, RecipeRow>(&format!(
        "UPDATE recipes \
         SET status = 'processing', updated_at = NOW() \
         WHERE id = $1 AND status = 'pending' \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::InvalidRecipeTransition {
        id,
        expected_status: "pending",
    })?;

    Ok(row)
}

/// Marks a processing job completed, writing every extracted field in the
/// same statement.
///
/// # Errors
///
/// Returns [`DbError::InvalidRecipeTransition`] if the job is not in
/// `processing` state, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_recipe(
    pool: &PgPool,
    id: Uuid,
    fields: &CompletedRecipeFields,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE recipes SET \
             status = 'completed', title = $2, description = $3, steps = $4, \
             ingredients = $5, nutrition = $6, categories = $7, tags = $8, \
             difficulty = $9, estimated_time_minutes = $10, servings = $11, \
             error_message = NULL, updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.steps)
    .bind(&fields.ingredients)
    .bind(&fields.nutrition)
    .bind(&fields.categories)
    .bind(&fields.tags)
    .bind(&fields.difficulty)
    .bind(fields.estimated_time_minutes)
    .bind(fields.servings)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRecipeTransition {
            id,
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Marks a processing job failed with the captured error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidRecipeTransition`] if the job is not in
/// `processing` state, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_recipe(pool: &PgPool, id: Uuid, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE recipes \
         SET status = 'failed', error_message = $2, updated_at = NOW() \
         WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .bind(error_message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRecipeTransition {
            id,
            expected_status: "processing",
        });
    }

    Ok(())
}

/// Deletes a job unconditionally. Returns `true` if a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_recipe(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns the newest completed recipes, `created_at` descending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_completed_recipes(pool: &PgPool, limit: i64) -> Result<Vec<RecipeRow>, DbError> {
    let rows = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {COLUMNS} FROM recipes \
         WHERE status = 'completed' \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Keyword-filtered page of completed recipes, newest first. `keyword`
/// matches the title case-insensitively; `None` returns all completed
/// recipes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_completed_by_keyword(
    pool: &PgPool,
    keyword: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<RecipeRow>, DbError> {
    let rows = sqlx::query_as::<_, RecipeRow>(&format!(
        "SELECT {COLUMNS} FROM recipes \
         WHERE status = 'completed' \
           AND ($1::text IS NULL OR title ILIKE '%' || $1 || '%') \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(keyword)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total completed recipes matching the keyword filter; pairs with
/// [`list_completed_by_keyword`] for pagination metadata.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_completed_by_keyword(
    pool: &PgPool,
    keyword: Option<&str>,
) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM recipes \
         WHERE status = 'completed' \
           AND ($1::text IS NULL OR title ILIKE '%' || $1 || '%')",
    )
    .bind(keyword)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            RecipeStatus::Pending,
            RecipeStatus::Processing,
            RecipeStatus::Completed,
            RecipeStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<RecipeStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_status_string_fails_to_parse() {
        assert!("cancelled".parse::<RecipeStatus>().is_err());
    }

    fn row_with(categories: Option<serde_json::Value>) -> RecipeRow {
        RecipeRow {
            id: Uuid::new_v4(),
            video_id: "abc".to_owned(),
            status: "completed".to_owned(),
            title: None,
            description: None,
            steps: None,
            ingredients: None,
            nutrition: None,
            categories,
            tags: None,
            difficulty: None,
            estimated_time_minutes: None,
            servings: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn category_list_reads_string_array() {
        let row = row_with(Some(serde_json::json!(["korean", "soup"])));
        assert_eq!(row.category_list(), vec!["korean", "soup"]);
    }

    #[test]
    fn category_list_tolerates_absent_or_malformed() {
        assert!(row_with(None).category_list().is_empty());
        assert!(row_with(Some(serde_json::json!("not-an-array")))
            .category_list()
            .is_empty());
        assert_eq!(
            row_with(Some(serde_json::json!(["ok", 42]))).category_list(),
            vec!["ok"]
        );
    }
}
