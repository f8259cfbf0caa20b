//! Read-side composition for the explorer surface: request history,
//! category-based recommendations, and trending recipes.
//!
//! Trending re-reads the view count for every candidate on every call.
//! That join is deliberately uncached — the ranking contract is
//! "50 newest completed, re-ranked by current view count" — so resist the
//! urge to snapshot it.

use serde::Serialize;
use sqlx::PgPool;

use chefclip_db::{
    get_video_record, list_completed_recipes, list_requested_recipes_by_user, DbError, RecipeRow,
};
use chefclip_youtube::Thumbnail;

const REQUESTED_HISTORY_LIMIT: i64 = 20;
const RECOMMENDATION_POOL_LIMIT: i64 = 100;
const RECOMMENDATION_LIMIT: usize = 10;
const TRENDING_CANDIDATE_LIMIT: i64 = 50;

/// A recipe in list form, joined with its video record's display data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeListItem {
    pub id: uuid::Uuid,
    pub youtube_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
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
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The explorer response: history, recommendations, trending.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerData {
    pub recommended_recipes: Vec<RecipeListItem>,
    pub requested_recipes: Vec<RecipeListItem>,
    pub trending_recipes: Vec<RecipeListItem>,
}

/// Builds the full explorer view for a user.
///
/// # Errors
///
/// Returns [`DbError`] if any underlying query fails.
pub async fn explore(pool: &PgPool, user_id: i64) -> Result<ExplorerData, DbError> {
    let requested = user_requested_recipes(pool, user_id).await?;
    let recommended = recommended_recipes(pool, &requested).await?;
    let trending = trending_recipes(pool, 10).await?;

    Ok(ExplorerData {
        recommended_recipes: recommended,
        requested_recipes: requested,
        trending_recipes: trending,
    })
}

/// The user's request history as list items, most recently requested first.
/// Deleted recipes are already filtered by the history join.
///
/// # Errors
///
/// Returns [`DbError`] if any underlying query fails.
pub async fn user_request_history(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<RecipeListItem>, DbError> {
    let recipes = list_requested_recipes_by_user(pool, user_id, limit).await?;
    map_to_list_items(pool, recipes).await
}

async fn user_requested_recipes(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<RecipeListItem>, DbError> {
    user_request_history(pool, user_id, REQUESTED_HISTORY_LIMIT).await
}

/// Recipes scored by category overlap with the user's request history.
///
/// No category signal falls back to the newest completed recipes. Already
/// requested recipes are excluded; ties keep the newest-first order of the
/// candidate fetch (the sort is stable).
async fn recommended_recipes(
    pool: &PgPool,
    requested: &[RecipeListItem],
) -> Result<Vec<RecipeListItem>, DbError> {
    let mut seen_categories = std::collections::HashSet::new();
    for item in requested {
        if let Some(categories) = item.categories.as_ref().and_then(serde_json::Value::as_array) {
            for category in categories.iter().filter_map(serde_json::Value::as_str) {
                seen_categories.insert(category.to_owned());
            }
        }
    }

    if seen_categories.is_empty() {
        let newest = list_completed_recipes(pool, RECOMMENDATION_LIMIT as i64).await?;
        return map_to_list_items(pool, newest).await;
    }

    let candidates = list_completed_recipes(pool, RECOMMENDATION_POOL_LIMIT).await?;
    let requested_ids: std::collections::HashSet<uuid::Uuid> =
        requested.iter().map(|item| item.id).collect();

    let mut scored: Vec<(usize, RecipeRow)> = candidates
        .into_iter()
        .filter(|recipe| !requested_ids.contains(&recipe.id))
        .map(|recipe| {
            let score = recipe
                .category_list()
                .iter()
                .filter(|category| seen_categories.contains(*category))
                .count();
            (score, recipe)
        })
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(RECOMMENDATION_LIMIT);

    map_to_list_items(pool, scored.into_iter().map(|(_, recipe)| recipe).collect()).await
}

/// The 50 newest completed recipes re-ranked by current video view count,
/// truncated to `limit`.
///
/// # Errors
///
/// Returns [`DbError`] if any underlying query fails.
pub async fn trending_recipes(
    pool: &PgPool,
    limit: usize,
) -> Result<Vec<RecipeListItem>, DbError> {
    let candidates = list_completed_recipes(pool, TRENDING_CANDIDATE_LIMIT).await?;

    let mut with_views = Vec::with_capacity(candidates.len());
    for recipe in candidates {
        let view_count = get_video_record(pool, &recipe.video_id)
            .await?
            .and_then(|record| record.view_count)
            .unwrap_or(0);
        with_views.push((view_count, recipe));
    }

    with_views.sort_by(|a, b| b.0.cmp(&a.0));
    with_views.truncate(limit);

    map_to_list_items(pool, with_views.into_iter().map(|(_, r)| r).collect()).await
}

/// Joins each recipe with its video record for display fields.
pub(crate) async fn map_to_list_items(
    pool: &PgPool,
    recipes: Vec<RecipeRow>,
) -> Result<Vec<RecipeListItem>, DbError> {
    let mut items = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        items.push(map_to_list_item(pool, recipe).await?);
    }
    Ok(items)
}

async fn map_to_list_item(pool: &PgPool, recipe: RecipeRow) -> Result<RecipeListItem, DbError> {
    let record = get_video_record(pool, &recipe.video_id).await?;

    let (thumbnail_url, channel_name, view_count) = record.map_or((None, None, None), |r| {
        (
            best_thumbnail_url(r.thumbnails.as_ref()),
            r.channel_name,
            r.view_count,
        )
    });

    Ok(RecipeListItem {
        id: recipe.id,
        youtube_id: recipe.video_id,
        title: recipe.title,
        description: recipe.description,
        thumbnail_url,
        channel_name,
        view_count,
        categories: recipe.categories,
        tags: recipe.tags,
        difficulty: recipe.difficulty,
        estimated_time: recipe.estimated_time_minutes,
        servings: recipe.servings,
        created_at: recipe.created_at,
        updated_at: recipe.updated_at,
    })
}

/// Largest stored thumbnail variant, by width.
fn best_thumbnail_url(thumbnails: Option<&serde_json::Value>) -> Option<String> {
    let parsed: Vec<Thumbnail> =
        serde_json::from_value(thumbnails?.clone()).unwrap_or_default();
    parsed
        .into_iter()
        .max_by_key(|t| t.width.unwrap_or(0))
        .map(|t| t.url)
}
