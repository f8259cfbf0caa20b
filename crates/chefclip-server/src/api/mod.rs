mod explorer;
mod recipes;
mod search;
mod users;
mod videos;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::generator::{GeneratorError, RecipeGenerator};
use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};
use crate::videos::{VideoDataError, VideoDataService};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub generator: Arc<RecipeGenerator>,
    pub videos: Arc<VideoDataService>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "bad_gateway" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &chefclip_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_generator_error(request_id: String, error: &GeneratorError) -> ApiError {
    match error {
        GeneratorError::NotFound(what) => ApiError::new(
            request_id,
            "not_found",
            format!("recipe not found: {what}"),
        ),
        GeneratorError::Db(db) => map_db_error(request_id, db),
    }
}

pub(super) fn map_video_error(request_id: String, error: &VideoDataError) -> ApiError {
    match error {
        VideoDataError::Source(source) => {
            tracing::warn!(error = %source, "video data source failed");
            ApiError::new(
                request_id,
                "bad_gateway",
                format!("video data source failed: {source}"),
            )
        }
        VideoDataError::Db(db) => map_db_error(request_id, db),
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/recipes/generate", post(recipes::generate_recipe))
        .route(
            "/api/v1/recipes/by-video/{video_ref}",
            get(recipes::get_recipe_by_video),
        )
        .route("/api/v1/recipes/popular", get(search::popular_recipes))
        .route(
            "/api/v1/recipes/keywords/popular",
            get(search::popular_keywords),
        )
        .route(
            "/api/v1/recipes/keywords/suggest",
            get(search::suggest_keywords),
        )
        .route("/api/v1/recipes", get(search::search_recipes))
        .route(
            "/api/v1/recipes/{id}",
            get(recipes::get_recipe_by_id).delete(recipes::delete_recipe),
        )
        .route("/api/v1/explorer/{user_id}", get(explorer::explore_recipes))
        .route(
            "/api/v1/explorer/{user_id}/history",
            get(explorer::request_history),
        )
        .route("/api/v1/videos/bulk", post(videos::get_bulk_video_data))
        .route("/api/v1/videos/{video_ref}", get(videos::get_video_data))
        .route("/api/v1/users", post(users::create_user))
        .route(
            "/api/v1/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match chefclip_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use chefclip_core::PromptConfig;
    use chefclip_gemini::GeminiClient;
    use chefclip_youtube::YoutubeClient;

    /// Builds an `AppState` whose clients point at the given base URLs. For
    /// DB-only route tests the upstreams are never reached, so an unused
    /// loopback port is fine.
    fn test_state(pool: sqlx::PgPool, youtube_uri: &str, gemini_uri: &str) -> AppState {
        let youtube = Arc::new(
            YoutubeClient::with_base_url(5, "chefclip-test", youtube_uri)
                .expect("youtube client")
                .with_retry_policy(0, 0),
        );
        let videos = Arc::new(VideoDataService::new(
            pool.clone(),
            youtube,
            100,
            "ko".to_owned(),
        ));
        let gemini = Arc::new(
            GeminiClient::with_base_url("test-key", "gemini-2.5-flash", 5, gemini_uri)
                .expect("gemini client"),
        );
        let prompt = Arc::new(PromptConfig {
            system_instruction: "Extract a structured recipe.".to_owned(),
            response_schema: serde_json::json!({ "type": "object" }),
            generation_config: serde_json::Value::Null,
        });
        let generator = Arc::new(RecipeGenerator::new(
            pool.clone(),
            Arc::clone(&videos),
            gemini,
            prompt,
        ));

        AppState {
            pool,
            generator,
            videos,
        }
    }

    fn test_app(pool: sqlx::PgPool) -> Router {
        let state = test_state(pool, "http://127.0.0.1:1", "http://127.0.0.1:1");
        let auth = AuthState::from_env(true).expect("auth");
        build_app(state, auth, default_rate_limit_state())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json parse")
    }

    #[test]
    fn normalize_limit_applies_defaults_and_bounds() {
        assert_eq!(normalize_limit(None), 50);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(1_000)), 200);
        assert_eq!(normalize_limit(Some(25)), 25);
    }

    #[test]
    fn api_error_not_found_maps_to_404() {
        let response = ApiError::new("req-1", "not_found", "nope").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn api_error_bad_gateway_maps_to_502() {
        let response = ApiError::new("req-1", "bad_gateway", "upstream").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_returns_ok(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn recipe_lookup_returns_404_for_unknown_video(pool: sqlx::PgPool) {
        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/recipes/by-video/doesnotexist")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn users_crud_round_trip(pool: sqlx::PgPool) {
        let app = test_app(pool);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/users")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "email": "cook@example.com", "nickname": "cook" })
                            .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let user_id = created["data"]["id"].as_i64().expect("user id");
        assert_eq!(created["data"]["email"].as_str(), Some("cook@example.com"));

        // Duplicate email conflicts.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/users")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "email": "cook@example.com" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/api/v1/users/{user_id}"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "nickname": "head chef" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["data"]["nickname"].as_str(), Some("head chef"));
        assert_eq!(updated["data"]["email"].as_str(), Some("cook@example.com"));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/users/{user_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/users/{user_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn explorer_fallback_for_user_without_history(pool: sqlx::PgPool) {
        let user_id = chefclip_db::create_user(&pool, "new@example.com", None)
            .await
            .expect("user")
            .id;
        for i in 0..3 {
            let job = chefclip_db::insert_processing_recipe(&pool, &format!("v{i}"))
                .await
                .expect("job")
                .expect("row");
            chefclip_db::complete_recipe(
                &pool,
                job.id,
                &chefclip_db::CompletedRecipeFields {
                    title: format!("Recipe {i}"),
                    description: None,
                    steps: serde_json::json!([]),
                    ingredients: serde_json::json!([]),
                    nutrition: None,
                    categories: serde_json::json!(["korean"]),
                    tags: serde_json::json!([]),
                    difficulty: None,
                    estimated_time_minutes: None,
                    servings: None,
                },
            )
            .await
            .expect("complete");
        }

        let app = test_app(pool);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/explorer/{user_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["data"]["requestedRecipes"].as_array().map(Vec::len),
            Some(0)
        );
        assert_eq!(
            json["data"]["recommendedRecipes"].as_array().map(Vec::len),
            Some(3)
        );
        assert!(json["data"]["trendingRecipes"].is_array());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn generate_route_returns_processing_job(pool: sqlx::PgPool) {
        let youtube = MockServer::start().await;
        let gemini = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videoDetails": {
                    "videoId": "abc123",
                    "title": "Kimchi Stew",
                    "viewCount": "100",
                    "author": "Chef Min",
                    "channelId": "UC1"
                }
            })))
            .mount(&youtube)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/browse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&youtube)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&youtube)
            .await;

        let state = test_state(pool, &youtube.uri(), &gemini.uri());
        let auth = AuthState::from_env(true).expect("auth");
        let app = build_app(state, auth, default_rate_limit_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/recipes/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "videoIdOrUrl": "https://www.youtube.com/watch?v=abc123"
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["youtubeId"].as_str(), Some("abc123"));
        assert_eq!(json["data"]["status"].as_str(), Some("processing"));
        assert!(json["data"]["id"].is_string());
        assert!(json["data"]["createdAt"].is_string());
        assert!(
            json["data"].get("title").is_none() || json["data"]["title"].is_null(),
            "extracted fields absent before completion"
        );
    }
}
