//! Data transfer objects shared by the cache, the remote source and the API.
//!
//! - `commit`: CommitRecord, PageRequest
//! - `project`: ProjectId, ProjectInfo, BranchInfo and the summary views
//!   returned to the facade

pub mod commit;
pub mod project;

pub use commit::*;
pub use project::*;
