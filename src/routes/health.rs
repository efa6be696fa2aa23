//! Liveness check.
//!
//! GET /health answers 200 with an empty body.

use axum::{http::StatusCode, routing::get, Router};

pub fn routes() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> StatusCode {
    tracing::trace!("received health check");
    StatusCode::OK
}
