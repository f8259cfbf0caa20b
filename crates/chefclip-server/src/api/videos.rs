//! Video data cache handlers.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use chefclip_db::VideoRecordRow;

use super::{map_video_error, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VideoDataParams {
    #[serde(default)]
    pub max_comments: Option<usize>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BulkVideoDataRequest {
    pub video_refs: Vec<String>,
    #[serde(default)]
    pub max_comments: Option<usize>,
    #[serde(default)]
    pub language: Option<String>,
}

/// A cached video record as exposed over the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VideoDataResponse {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<serde_json::Value>,
    pub is_live: bool,
    pub is_shorts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_comments: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_segments: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_full_text: Option<String>,
    pub is_complete: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub collected_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<VideoRecordRow> for VideoDataResponse {
    fn from(row: VideoRecordRow) -> Self {
        let is_complete = row.is_complete();
        Self {
            video_id: row.video_id,
            video_url: row.video_url,
            title: row.title,
            description: row.description,
            duration_secs: row.duration_secs,
            view_count: row.view_count,
            like_count: row.like_count,
            upload_date: row.upload_date,
            category: row.category,
            tags: row.tags,
            thumbnails: row.thumbnails,
            is_live: row.is_live,
            is_shorts: row.is_shorts,
            channel_id: row.channel_id,
            channel_name: row.channel_name,
            channel_url: row.channel_url,
            channel_description: row.channel_description,
            total_comments: row.total_comments,
            comments: row.comments,
            transcript_language: row.transcript_language,
            transcript_segments: row.transcript_segments,
            transcript_full_text: row.transcript_full_text,
            is_complete,
            status: row.status,
            error_message: row.error_message,
            collected_at: row.collected_at,
            updated_at: row.updated_at,
        }
    }
}

/// One entry of a bulk response: either the record or the per-item error.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BulkVideoDataItem {
    pub video_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<VideoDataResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /api/v1/videos/{video_ref}?maxComments=&language=`
pub(super) async fn get_video_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(video_ref): Path<String>,
    Query(params): Query<VideoDataParams>,
) -> impl IntoResponse {
    match state
        .videos
        .get_comprehensive_video_data(&video_ref, params.max_comments, params.language.as_deref())
        .await
    {
        Ok(record) => Ok(Json(ApiResponse {
            data: VideoDataResponse::from(record),
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_video_error(req_id.0, &e)),
    }
}

/// `POST /api/v1/videos/bulk` — per-item isolation: one failing reference
/// reports its error inline without failing the batch.
pub(super) async fn get_bulk_video_data(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<BulkVideoDataRequest>,
) -> impl IntoResponse {
    let results = state
        .videos
        .get_bulk_comprehensive_video_data(
            &request.video_refs,
            request.max_comments,
            request.language.as_deref(),
        )
        .await;

    let items: Vec<BulkVideoDataItem> = request
        .video_refs
        .iter()
        .zip(results)
        .map(|(video_ref, result)| match result {
            Ok(record) => BulkVideoDataItem {
                video_ref: video_ref.clone(),
                data: Some(VideoDataResponse::from(record)),
                error: None,
            },
            Err(err) => BulkVideoDataItem {
                video_ref: video_ref.clone(),
                data: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    Json(ApiResponse {
        data: items,
        meta: ResponseMeta::new(req_id.0),
    })
}
