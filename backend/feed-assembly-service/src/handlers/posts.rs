use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use tracing::debug;

use super::AppState;
use crate::db::{PostFilter, PostQuery, PostSort};
use crate::error::{AppError, Result};
use crate::middleware::ViewerId;
use crate::models::{PostListResponse, SearchResponse};

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListParams {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    pub is_poem: Option<bool>,
    pub is_original: Option<bool>,
}

fn default_list_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

fn default_search_limit() -> u32 {
    20
}

/// GET /api/v1/posts
/// Chronological page with optional poem / original filters
#[get("/api/v1/posts")]
pub async fn list_posts(
    viewer: Option<ViewerId>,
    query: web::Query<PostListParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE) as usize;

    let posts = state
        .store
        .find_posts(&PostQuery {
            filter: PostFilter {
                is_poem: query.is_poem,
                is_original: query.is_original,
                ..Default::default()
            },
            sort: PostSort::Newest,
            skip: query.skip as usize,
            limit,
        })
        .await?;

    let views = state
        .materializer
        .materialize(viewer.as_ref().map(ViewerId::as_str), posts)
        .await;

    debug!("Listed {} posts (skip={})", views.len(), query.skip);

    Ok(HttpResponse::Ok().json(PostListResponse {
        success: true,
        posts: views,
    }))
}

/// GET /api/v1/posts/search
/// Case-insensitive keyword match over title, content and tags
#[get("/api/v1/posts/search")]
pub async fn search_posts(
    viewer: Option<ViewerId>,
    query: web::Query<SearchParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let keyword = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest("Search keyword is required".to_string()))?;

    let filter = PostFilter {
        keyword: Some(keyword.to_string()),
        ..Default::default()
    };
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE) as usize;

    let posts = state
        .store
        .find_posts(&PostQuery::newest(filter, limit))
        .await?;

    let views = state
        .materializer
        .materialize(viewer.as_ref().map(ViewerId::as_str), posts)
        .await;

    debug!("Search '{}' matched {} posts", keyword, views.len());

    Ok(HttpResponse::Ok().json(SearchResponse {
        success: true,
        total: views.len(),
        posts: views,
    }))
}
