//! Branch listing and checkout endpoints.
//!
//! - GET /api/v1/branches
//!   Lists every branch with a local cache, current branch flagged.
//!   Empty when no project is open.
//!
//! - POST /api/v1/checkout { branch: string }
//!   Switches the current branch after checking it exists remotely.
//!   The branch's existing cache, if any, is kept.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::history::SharedRegistry;
use crate::models::BranchSummary;

pub fn routes(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/api/v1/branches", get(list_branches))
        .route("/api/v1/checkout", post(checkout_branch))
        .with_state(registry)
}

async fn list_branches(State(registry): State<SharedRegistry>) -> Result<Json<Vec<BranchSummary>>> {
    let branches = registry.branch_summaries()?;
    Ok(Json(branches))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    branch: String,
}

async fn checkout_branch(
    State(registry): State<SharedRegistry>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<()>> {
    registry.checkout(&request.branch).await?;
    Ok(Json(()))
}
