//! Explorer handlers: recommendations, trending, and per-user history.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

use super::{map_db_error, normalize_limit, ApiResponse, AppState, ResponseMeta};
use crate::explorer;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct HistoryParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `GET /api/v1/explorer/{user_id}` — requested + recommended + trending.
pub(super) async fn explore_recipes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    match explorer::explore(&state.pool, user_id).await {
        Ok(data) => Ok(Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}

/// `GET /api/v1/explorer/{user_id}/history?limit=`
pub(super) async fn request_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = normalize_limit(params.limit);
    match explorer::user_request_history(&state.pool, user_id, limit).await {
        Ok(items) => Ok(Json(ApiResponse {
            data: items,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}
