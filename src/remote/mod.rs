//! Remote commit sources.
//!
//! The cache never talks HTTP itself; it consumes the `CommitSource` trait.
//! - `github`: GitHub REST API implementation
//! - `reference`: parsing of user-supplied project references
//! - `memory`: scripted in-memory source used by tests

pub mod github;
#[cfg(test)]
pub mod memory;
pub mod reference;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BranchInfo, CommitRecord, ProjectId, ProjectInfo};

pub use github::GitHubSource;
pub use reference::parse_project_reference;

/// Page size used by the remote when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Errors raised at the remote boundary.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The requested project or branch does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Paginated, newest-first view of a remote project's history.
///
/// Pages are 1-based and hold at most `page_size()` commits; a page past the
/// end of history is empty.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Fixed number of commits per remote page.
    fn page_size(&self) -> usize;

    async fn resolve_project(&self, project: &ProjectId) -> Result<ProjectInfo, RemoteError>;

    async fn resolve_branch(
        &self,
        project: &ProjectId,
        name: &str,
    ) -> Result<BranchInfo, RemoteError>;

    async fn fetch_commit_page(
        &self,
        project: &ProjectId,
        branch: &str,
        page: usize,
    ) -> Result<Vec<CommitRecord>, RemoteError>;
}
