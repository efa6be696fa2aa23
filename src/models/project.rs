use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical owner/repository pair identifying a remote project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId {
    pub owner: String,
    pub repository: String,
}

impl ProjectId {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

/// Project metadata as resolved by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub default_branch: Option<String>,
}

/// Branch metadata as resolved by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchSummary {
    pub name: String,
    pub is_current: bool,
    /// `None` while a read on the branch is in flight
    pub cached_commits: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project: String,
    pub current_branch: Option<String>,
    pub branches: Vec<BranchSummary>,
}
