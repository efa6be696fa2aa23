//! Commit history endpoints.
//!
//! - GET /commits?url=&page=&size=
//!   Opens the referenced project (no-op when already open) and returns a page
//!   of its current branch. Any failure answers 400.
//!
//! - GET /api/v1/commits?page=&size=
//!   Page of the active project's current branch.
//!
//! `page` defaults to 1 and `size` to one remote page.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::history::SharedRegistry;
use crate::models::{CommitRecord, PageRequest};

pub fn routes(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/commits", get(get_commits_by_url))
        .route("/api/v1/commits", get(get_commits))
        .with_state(registry)
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UrlQuery {
    url: String,
    page: Option<i64>,
    size: Option<i64>,
}

fn page_request(
    registry: &SharedRegistry,
    page: Option<i64>,
    size: Option<i64>,
) -> Result<PageRequest> {
    let default_size = i64::try_from(registry.page_size()).unwrap_or(i64::MAX);
    PageRequest::new(page.unwrap_or(1), size.unwrap_or(default_size))
}

async fn get_commits_by_url(
    State(registry): State<SharedRegistry>,
    Query(query): Query<UrlQuery>,
) -> Response {
    let result: Result<Vec<CommitRecord>> = async {
        let request = page_request(&registry, query.page, query.size)?;
        let project = registry.open(&query.url).await?;
        registry.page_of(&project, request).await
    }
    .await;

    match result {
        Ok(commits) => Json(commits).into_response(),
        Err(e) => {
            tracing::warn!("Failed to retrieve commits from {}: {}", query.url, e);
            let body = Json(json!({
                "error": e.to_string(),
            }));
            (StatusCode::BAD_REQUEST, body).into_response()
        }
    }
}

async fn get_commits(
    State(registry): State<SharedRegistry>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<CommitRecord>>> {
    let request = page_request(&registry, query.page, query.size)?;
    let project = registry.active()?.ok_or(AppError::NoActiveProject)?;
    let commits = registry.page_of(&project, request).await?;
    Ok(Json(commits))
}
