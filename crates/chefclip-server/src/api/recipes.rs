//! Recipe generation and lookup handlers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chefclip_db::RecipeRow;

use super::{map_generator_error, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GenerateRecipeRequest {
    pub video_id_or_url: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// A recipe job as exposed over the API. Extracted fields stay absent until
/// the job completes; `errorMessage` appears only on failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RecipeResponse {
    pub id: Uuid,
    pub youtube_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<RecipeRow> for RecipeResponse {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            youtube_id: row.video_id,
            status: row.status,
            title: row.title,
            description: row.description,
            steps: row.steps,
            ingredients: row.ingredients,
            nutrition: row.nutrition,
            categories: row.categories,
            tags: row.tags,
            difficulty: row.difficulty,
            estimated_time: row.estimated_time_minutes,
            servings: row.servings,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    message: &'static str,
}

/// `POST /api/v1/recipes/generate` — returns the settled job immediately;
/// extraction continues in the background and is observed by polling.
pub(super) async fn generate_recipe(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<GenerateRecipeRequest>,
) -> impl IntoResponse {
    match state
        .generator
        .generate(&request.video_id_or_url, request.user_id)
        .await
    {
        Ok(job) => Ok(Json(ApiResponse {
            data: RecipeResponse::from(job),
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_generator_error(req_id.0, &e)),
    }
}

/// `GET /api/v1/recipes/by-video/{video_ref}`
pub(super) async fn get_recipe_by_video(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(video_ref): Path<String>,
) -> impl IntoResponse {
    match state.generator.get_recipe(&video_ref).await {
        Ok(job) => Ok(Json(ApiResponse {
            data: RecipeResponse::from(job),
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_generator_error(req_id.0, &e)),
    }
}

/// `GET /api/v1/recipes/{id}`
pub(super) async fn get_recipe_by_id(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.generator.get_recipe_by_id(id).await {
        Ok(job) => Ok(Json(ApiResponse {
            data: RecipeResponse::from(job),
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_generator_error(req_id.0, &e)),
    }
}

/// `DELETE /api/v1/recipes/{id}` — unconditional; deleting an absent recipe
/// is not an error.
pub(super) async fn delete_recipe(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.generator.delete_recipe(id).await {
        Ok(_) => Ok(Json(ApiResponse {
            data: DeletedResponse {
                message: "recipe deleted",
            },
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_generator_error(req_id.0, &e)),
    }
}
