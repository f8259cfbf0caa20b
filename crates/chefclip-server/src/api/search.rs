//! Recipe search, popular/trending listing, and keyword suggestions.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use chefclip_db::recipes::{count_completed_by_keyword, list_completed_by_keyword};
use chefclip_db::{list_completed_recipes, RecipeRow};

use super::{map_db_error, normalize_limit, ApiResponse, AppState, ResponseMeta};
use crate::explorer::{map_to_list_items, trending_recipes, RecipeListItem};
use crate::middleware::RequestId;

/// Completed recipes scanned when aggregating keyword frequencies.
const KEYWORD_SCAN_LIMIT: i64 = 1_000;

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaginationMeta {
    pub current_page: i64,
    pub items_per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchPage {
    pub items: Vec<RecipeListItem>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub(super) struct KeywordList {
    pub keywords: Vec<KeywordItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct KeywordItem {
    pub keyword: String,
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct LimitParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SuggestParams {
    pub input: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub(super) fn pagination_meta(page: i64, limit: i64, total_items: i64) -> PaginationMeta {
    let total_pages = if total_items == 0 {
        0
    } else {
        (total_items + limit - 1) / limit
    };
    PaginationMeta {
        current_page: page,
        items_per_page: limit,
        total_items,
        total_pages,
        has_next_page: page < total_pages,
        has_previous_page: page > 1,
    }
}

/// `GET /api/v1/recipes?keyword=&category=&page=&limit=`
///
/// Keyword filtering happens in SQL; the category filter is applied to the
/// fetched page afterwards, matching the behaviour clients already rely on.
pub(super) async fn search_recipes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;
    let keyword = params
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let fetched = match list_completed_by_keyword(&state.pool, keyword, limit, offset).await {
        Ok(rows) => rows,
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };
    let total_items = match count_completed_by_keyword(&state.pool, keyword).await {
        Ok(count) => count,
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    let filtered: Vec<RecipeRow> = match &params.category {
        Some(category) => fetched
            .into_iter()
            .filter(|recipe| recipe.category_list().iter().any(|c| c == category))
            .collect(),
        None => fetched,
    };

    let items = match map_to_list_items(&state.pool, filtered).await {
        Ok(items) => items,
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    Ok(Json(ApiResponse {
        data: SearchPage {
            items,
            meta: pagination_meta(page, limit, total_items),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/recipes/popular?limit=` — trending list.
pub(super) async fn popular_recipes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = usize::try_from(normalize_limit(params.limit)).unwrap_or(50);
    match trending_recipes(&state.pool, limit).await {
        Ok(items) => Ok(Json(ApiResponse {
            data: items,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(map_db_error(req_id.0, &e)),
    }
}

/// `GET /api/v1/recipes/keywords/popular?limit=` — category frequencies
/// over completed recipes.
pub(super) async fn popular_keywords(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<LimitParams>,
) -> impl IntoResponse {
    let limit = normalize_limit(params.limit);
    let recipes = match list_completed_recipes(&state.pool, KEYWORD_SCAN_LIMIT).await {
        Ok(rows) => rows,
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    let mut counts: HashMap<String, i64> = HashMap::new();
    for recipe in &recipes {
        for category in recipe.category_list() {
            *counts.entry(category).or_insert(0) += 1;
        }
    }

    Ok(Json(ApiResponse {
        data: KeywordList {
            keywords: ranked_keywords(counts, limit),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/recipes/keywords/suggest?input=&limit=` — substring match
/// over titles, categories, and tags with frequency ranking.
pub(super) async fn suggest_keywords(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SuggestParams>,
) -> impl IntoResponse {
    let limit = normalize_limit(params.limit);
    let input = params.input.trim().to_lowercase();
    if input.is_empty() {
        return Ok(Json(ApiResponse {
            data: KeywordList {
                keywords: Vec::new(),
            },
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let recipes = match list_completed_recipes(&state.pool, KEYWORD_SCAN_LIMIT).await {
        Ok(rows) => rows,
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    let mut counts: HashMap<String, i64> = HashMap::new();
    for recipe in &recipes {
        if let Some(title) = &recipe.title {
            if title.to_lowercase().contains(&input) {
                *counts.entry(title.clone()).or_insert(0) += 1;
            }
        }
        for category in recipe.category_list() {
            if category.to_lowercase().contains(&input) {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        let tags = recipe
            .tags
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(ToOwned::to_owned))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        for tag in tags {
            if tag.to_lowercase().contains(&input) {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
    }

    Ok(Json(ApiResponse {
        data: KeywordList {
            keywords: ranked_keywords(counts, limit),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn ranked_keywords(counts: HashMap<String, i64>, limit: i64) -> Vec<KeywordItem> {
    let mut ranked: Vec<KeywordItem> = counts
        .into_iter()
        .map(|(keyword, count)| KeywordItem { keyword, count })
        .collect();
    // Count descending, then alphabetical for a stable order.
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
    ranked.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_meta_computes_pages() {
        let meta = pagination_meta(2, 20, 45);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_previous_page);
    }

    #[test]
    fn pagination_meta_first_and_last_page_flags() {
        let first = pagination_meta(1, 20, 45);
        assert!(first.has_next_page);
        assert!(!first.has_previous_page);

        let last = pagination_meta(3, 20, 45);
        assert!(!last.has_next_page);
        assert!(last.has_previous_page);
    }

    #[test]
    fn pagination_meta_empty_result() {
        let meta = pagination_meta(1, 20, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_previous_page);
    }

    #[test]
    fn ranked_keywords_orders_by_count_then_name() {
        let mut counts = HashMap::new();
        counts.insert("soup".to_owned(), 3);
        counts.insert("baking".to_owned(), 5);
        counts.insert("korean".to_owned(), 3);

        let ranked = ranked_keywords(counts, 10);
        let names: Vec<&str> = ranked.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(names, vec!["baking", "korean", "soup"]);
    }
}
