//! Active project endpoints.
//!
//! - GET /api/v1/project
//!   Project name, current branch and cached branches. 404 when none is open.
//!
//! - POST /api/v1/project { reference: string }
//!   Opens a project by owner/repo or GitHub URL. Re-opening the active
//!   project keeps its caches.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::history::SharedRegistry;
use crate::models::ProjectSummary;

pub fn routes(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/api/v1/project", get(get_project).post(open_project))
        .with_state(registry)
}

async fn get_project(State(registry): State<SharedRegistry>) -> Result<Json<ProjectSummary>> {
    let summary = registry.summary()?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
struct OpenRequest {
    reference: String,
}

async fn open_project(
    State(registry): State<SharedRegistry>,
    Json(request): Json<OpenRequest>,
) -> Result<Json<ProjectSummary>> {
    let project = registry.open(&request.reference).await?;
    let summary = project.summary()?;
    Ok(Json(summary))
}
