//! Application error types and HTTP response mapping.
//!
//! Defines `AppError` enum for all error conditions and implements Axum's
//! `IntoResponse` to automatically convert errors to appropriate HTTP responses
//! with JSON error bodies.
//!
//! Error mappings:
//! - `ProjectNotFound`, `BranchNotFound`, `NoActiveProject` → 404
//! - `NoActiveBranch`, `InvalidPageRequest`, `InvalidReference` → 400
//! - `RemoteFetchFailed` → 502
//! - `Internal` → 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("No project is open")]
    NoActiveProject,

    #[error("No branch is checked out")]
    NoActiveBranch,

    #[error("Remote fetch failed: {0}")]
    RemoteFetchFailed(#[from] RemoteError),

    #[error("Invalid page request: page={page}, size={size}")]
    InvalidPageRequest { page: i64, size: i64 },

    #[error("Invalid project reference: {0}")]
    InvalidReference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ProjectNotFound(_) | AppError::BranchNotFound(_) | AppError::NoActiveProject => {
                StatusCode::NOT_FOUND
            }
            AppError::NoActiveBranch
            | AppError::InvalidPageRequest { .. }
            | AppError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            AppError::RemoteFetchFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
