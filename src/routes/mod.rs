//! API route handlers - maps HTTP endpoints to registry operations.
//!
//! Each submodule defines routes for a feature area:
//! - `health`: Liveness check (GET /health)
//! - `commits`: Paginated commit history
//! - `branches`: Branch listing and checkout
//! - `project`: Opening and describing the active project

pub mod branches;
pub mod commits;
pub mod health;
pub mod project;

use axum::Router;

use crate::history::SharedRegistry;

pub fn create_router(registry: SharedRegistry) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(commits::routes(registry.clone()))
        .merge(branches::routes(registry.clone()))
        .merge(project::routes(registry))
}
