//! Database operations for the `video_records` table — the Video Data Cache.
//!
//! A record is created once per video id and then filled field-by-field by
//! the fetch-and-fill service. Completeness is a derived predicate on the
//! loaded row, never a stored column.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `video_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VideoRecordRow {
    pub id: i64,
    pub video_id: String,
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub upload_date: Option<String>,
    pub category: Option<String>,
    pub tags: Option<serde_json::Value>,
    pub thumbnails: Option<serde_json::Value>,
    pub is_live: bool,
    pub is_shorts: bool,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub channel_url: Option<String>,
    pub channel_description: Option<String>,
    pub channel_subscriber_count: Option<String>,
    pub channel_video_count: Option<String>,
    pub channel_thumbnails: Option<serde_json::Value>,
    pub channel_keywords: Option<serde_json::Value>,
    /// NULL means the comments category has never been attempted; 0 means it
    /// was attempted and came back empty (or failed and was defaulted).
    pub total_comments: Option<i32>,
    pub comments: Option<serde_json::Value>,
    pub transcript_language: Option<String>,
    pub transcript_segments: Option<serde_json::Value>,
    pub transcript_full_text: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
    pub error_message: Option<String>,
}

impl VideoRecordRow {
    /// The completeness predicate: basic info (title + view count), channel
    /// identity (id + name), at least one collected comment, and a non-empty
    /// transcript. A complete record is returned from cache without any
    /// further source calls.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let has_basic_info = self.title.is_some() && self.view_count.is_some();
        let has_channel_info = self.channel_id.is_some() && self.channel_name.is_some();
        let has_comments = self.total_comments.is_some_and(|c| c > 0);
        let has_transcript = self
            .transcript_segments
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .is_some_and(|segments| !segments.is_empty());

        has_basic_info && has_channel_info && has_comments && has_transcript
    }
}

/// Field set for creating a new video record; `id`, `collected_at` and
/// `updated_at` come from the database.
#[derive(Debug, Clone, Default)]
pub struct VideoRecordDraft {
    pub video_id: String,
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_secs: Option<i64>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub upload_date: Option<String>,
    pub category: Option<String>,
    pub tags: Option<serde_json::Value>,
    pub thumbnails: Option<serde_json::Value>,
    pub is_live: bool,
    pub is_shorts: bool,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub channel_url: Option<String>,
    pub channel_description: Option<String>,
    pub channel_subscriber_count: Option<String>,
    pub channel_video_count: Option<String>,
    pub channel_thumbnails: Option<serde_json::Value>,
    pub channel_keywords: Option<serde_json::Value>,
    pub total_comments: Option<i32>,
    pub comments: Option<serde_json::Value>,
    pub transcript_language: Option<String>,
    pub transcript_segments: Option<serde_json::Value>,
    pub transcript_full_text: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
}

const COLUMNS: &str = "id, video_id, video_url, title, description, duration_secs, view_count, \
     like_count, upload_date, category, tags, thumbnails, is_live, is_shorts, \
     channel_id, channel_name, channel_url, channel_description, \
     channel_subscriber_count, channel_video_count, channel_thumbnails, \
     channel_keywords, total_comments, comments, transcript_language, \
     transcript_segments, transcript_full_text, collected_at, updated_at, \
     status, error_message";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Fetches the cached record for a video id, or `None` if never collected.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_video_record(
    pool: &PgPool,
    video_id: &str,
) -> Result<Option<VideoRecordRow>, DbError> {
    let row = sqlx::query_as::<_, VideoRecordRow>(&format!(
        "SELECT {COLUMNS} FROM video_records WHERE video_id = $1"
    ))
    .bind(video_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a freshly-collected record and returns the stored row.
///
/// A unique-constraint violation on `video_id` (two concurrent first
/// collections) is surfaced as [`DbError::Sqlx`]; callers recover by
/// re-reading the existing row (see [`crate::is_unique_violation`]).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_video_record(
    pool: &PgPool,
    draft: &VideoRecordDraft,
) -> Result<VideoRecordRow, DbError> {
    let row = sqlx::query_as::<_, VideoRecordRow>(&format!(
        "INSERT INTO video_records \
             (video_id, video_url, title, description, duration_secs, view_count, \
              like_count, upload_date, category, tags, thumbnails, is_live, is_shorts, \
              channel_id, channel_name, channel_url, channel_description, \
              channel_subscriber_count, channel_video_count, channel_thumbnails, \
              channel_keywords, total_comments, comments, transcript_language, \
              transcript_segments, transcript_full_text, status, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28) \
         RETURNING {COLUMNS}"
    ))
    .bind(&draft.video_id)
    .bind(&draft.video_url)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.duration_secs)
    .bind(draft.view_count)
    .bind(draft.like_count)
    .bind(&draft.upload_date)
    .bind(&draft.category)
    .bind(&draft.tags)
    .bind(&draft.thumbnails)
    .bind(draft.is_live)
    .bind(draft.is_shorts)
    .bind(&draft.channel_id)
    .bind(&draft.channel_name)
    .bind(&draft.channel_url)
    .bind(&draft.channel_description)
    .bind(&draft.channel_subscriber_count)
    .bind(&draft.channel_video_count)
    .bind(&draft.channel_thumbnails)
    .bind(&draft.channel_keywords)
    .bind(draft.total_comments)
    .bind(&draft.comments)
    .bind(&draft.transcript_language)
    .bind(&draft.transcript_segments)
    .bind(&draft.transcript_full_text)
    .bind(&draft.status)
    .bind(&draft.error_message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Writes every mutable field of the row back and advances `updated_at`.
///
/// The fill service calls this only when a category actually changed, so an
/// all-failures fill pass does not touch `updated_at`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists for the row's `video_id`,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn update_video_record(
    pool: &PgPool,
    row: &VideoRecordRow,
) -> Result<VideoRecordRow, DbError> {
    let updated = sqlx::query_as::<_, VideoRecordRow>(&format!(
        "UPDATE video_records SET \
             video_url = $2, title = $3, description = $4, duration_secs = $5, \
             view_count = $6, like_count = $7, upload_date = $8, category = $9, \
             tags = $10, thumbnails = $11, is_live = $12, is_shorts = $13, \
             channel_id = $14, channel_name = $15, channel_url = $16, \
             channel_description = $17, channel_subscriber_count = $18, \
             channel_video_count = $19, channel_thumbnails = $20, \
             channel_keywords = $21, total_comments = $22, comments = $23, \
             transcript_language = $24, transcript_segments = $25, \
             transcript_full_text = $26, status = $27, error_message = $28, \
             updated_at = NOW() \
         WHERE video_id = $1 \
         RETURNING {COLUMNS}"
    ))
    .bind(&row.video_id)
    .bind(&row.video_url)
    .bind(&row.title)
    .bind(&row.description)
    .bind(row.duration_secs)
    .bind(row.view_count)
    .bind(row.like_count)
    .bind(&row.upload_date)
    .bind(&row.category)
    .bind(&row.tags)
    .bind(&row.thumbnails)
    .bind(row.is_live)
    .bind(row.is_shorts)
    .bind(&row.channel_id)
    .bind(&row.channel_name)
    .bind(&row.channel_url)
    .bind(&row.channel_description)
    .bind(&row.channel_subscriber_count)
    .bind(&row.channel_video_count)
    .bind(&row.channel_thumbnails)
    .bind(&row.channel_keywords)
    .bind(row.total_comments)
    .bind(&row.comments)
    .bind(&row.transcript_language)
    .bind(&row.transcript_segments)
    .bind(&row.transcript_full_text)
    .bind(&row.status)
    .bind(&row.error_message)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row() -> VideoRecordRow {
        VideoRecordRow {
            id: 1,
            video_id: "abc123".to_owned(),
            video_url: None,
            title: Some("t".to_owned()),
            description: None,
            duration_secs: None,
            view_count: Some(10),
            like_count: None,
            upload_date: None,
            category: None,
            tags: None,
            thumbnails: None,
            is_live: false,
            is_shorts: false,
            channel_id: Some("UC1".to_owned()),
            channel_name: Some("chan".to_owned()),
            channel_url: None,
            channel_description: None,
            channel_subscriber_count: None,
            channel_video_count: None,
            channel_thumbnails: None,
            channel_keywords: None,
            total_comments: Some(3),
            comments: Some(serde_json::json!([])),
            transcript_language: Some("ko".to_owned()),
            transcript_segments: Some(serde_json::json!([{ "text": "hi" }])),
            transcript_full_text: Some("hi".to_owned()),
            collected_at: Utc::now(),
            updated_at: Utc::now(),
            status: "active".to_owned(),
            error_message: None,
        }
    }

    #[test]
    fn complete_when_all_categories_present() {
        assert!(base_row().is_complete());
    }

    #[test]
    fn incomplete_without_title() {
        let mut row = base_row();
        row.title = None;
        assert!(!row.is_complete());
    }

    #[test]
    fn incomplete_without_view_count() {
        let mut row = base_row();
        row.view_count = None;
        assert!(!row.is_complete());
    }

    #[test]
    fn incomplete_without_channel_identity() {
        let mut row = base_row();
        row.channel_name = None;
        assert!(!row.is_complete());
    }

    #[test]
    fn incomplete_with_zero_comments() {
        let mut row = base_row();
        row.total_comments = Some(0);
        assert!(!row.is_complete());
    }

    #[test]
    fn incomplete_with_unattempted_comments() {
        let mut row = base_row();
        row.total_comments = None;
        assert!(!row.is_complete());
    }

    #[test]
    fn incomplete_with_empty_transcript() {
        let mut row = base_row();
        row.transcript_segments = Some(serde_json::json!([]));
        assert!(!row.is_complete());

        row.transcript_segments = None;
        assert!(!row.is_complete());
    }
}
