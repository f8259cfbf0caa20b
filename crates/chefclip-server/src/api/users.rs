//! User management handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use chefclip_db::{is_unique_violation, UserRow};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserResponse {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            nickname: row.nickname,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    message: &'static str,
}

/// `POST /api/v1/users`
pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<CreateUserRequest>,
) -> impl IntoResponse {
    match chefclip_db::create_user(&state.pool, &request.email, request.nickname.as_deref()).await
    {
        Ok(user) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse {
                data: UserResponse::from(user),
                meta: ResponseMeta::new(req_id.0),
            }),
        )),
        Err(e) if is_unique_violation(&e) => Err(ApiError::new(
            req_id.0,
            "conflict",
            "a user with this email already exists",
        )),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}

/// `GET /api/v1/users/{id}`
pub(super) async fn get_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match chefclip_db::get_user(&state.pool, id).await {
        Ok(Some(user)) => Ok(Json(ApiResponse {
            data: UserResponse::from(user),
            meta: ResponseMeta::new(req_id.0),
        })),
        Ok(None) => Err(ApiError::new(req_id.0, "not_found", "user not found")),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}

/// `PATCH /api/v1/users/{id}` — partial update.
pub(super) async fn update_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    match chefclip_db::update_user(
        &state.pool,
        id,
        request.email.as_deref(),
        request.nickname.as_deref(),
    )
    .await
    {
        Ok(user) => Ok(Json(ApiResponse {
            data: UserResponse::from(user),
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(chefclip_db::DbError::NotFound) => {
            Err(ApiError::new(req_id.0, "not_found", "user not found"))
        }
        Err(e) if is_unique_violation(&e) => Err(ApiError::new(
            req_id.0,
            "conflict",
            "a user with this email already exists",
        )),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}

/// `DELETE /api/v1/users/{id}` — request history cascades.
pub(super) async fn delete_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match chefclip_db::delete_user(&state.pool, id).await {
        Ok(true) => Ok(Json(ApiResponse {
            data: DeletedResponse {
                message: "user deleted",
            },
            meta: ResponseMeta::new(req_id.0),
        })),
        Ok(false) => Err(ApiError::new(req_id.0, "not_found", "user not found")),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}
