//! In-memory `CommitSource` for deterministic tests.
//!
//! Holds whole branch histories (newest first), slices them into pages the way
//! a paginated API would, and records every page fetch so tests can assert on
//! remote traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{CommitSource, RemoteError};
use crate::models::{BranchInfo, CommitRecord, ProjectId, ProjectInfo};

#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<MemorySourceInner>>,
    page_size: usize,
}

#[derive(Debug, Default)]
struct MemorySourceInner {
    projects: HashMap<ProjectId, MemoryProject>,
    /// (branch, page) for every fetch_commit_page call, in order
    fetches: Vec<(String, usize)>,
    /// Fail the next fetch of this page number
    fail_on_page: Option<usize>,
    /// Serial used to mint unique commits
    next_serial: usize,
}

#[derive(Debug, Default)]
struct MemoryProject {
    default_branch: Option<String>,
    branches: HashMap<String, Vec<CommitRecord>>,
}

/// Commit with a deterministic, unique sha.
pub fn commit(serial: usize) -> CommitRecord {
    CommitRecord::new(
        format!("{:040x}", serial),
        "Monalisa Octocat",
        format!("2024-01-01T00:00:{:02}Z", serial % 60),
        format!("commit {}", serial),
    )
}

impl MemorySource {
    pub fn new(page_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemorySourceInner::default())),
            page_size,
        }
    }

    /// Register a project whose default branch has `len` commits.
    pub fn with_project(self, project: &ProjectId, default_branch: &str, len: usize) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.projects.entry(project.clone()).or_default().default_branch =
                Some(default_branch.to_string());
        }
        self.with_branch(project, default_branch, len)
    }

    /// Register a project the remote reports without a default branch.
    pub fn with_bare_project(self, project: &ProjectId) -> Self {
        self.inner
            .lock()
            .unwrap()
            .projects
            .entry(project.clone())
            .or_default();
        self
    }

    /// Add (or replace) a branch with `len` fresh commits.
    pub fn with_branch(self, project: &ProjectId, branch: &str, len: usize) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let history = inner.mint(len);
            inner
                .projects
                .entry(project.clone())
                .or_default()
                .branches
                .insert(branch.to_string(), history);
        }
        self
    }

    /// Land `count` new commits on top of a branch.
    pub fn advance(&self, project: &ProjectId, branch: &str, count: usize) {
        let mut inner = self.inner.lock().unwrap();
        let mut fresh = inner.mint(count);
        let history = inner.branch_mut(project, branch);
        fresh.append(history);
        *history = fresh;
    }

    /// Replace a branch's history entirely, as a force push would.
    pub fn rewrite(&self, project: &ProjectId, branch: &str, len: usize) {
        let mut inner = self.inner.lock().unwrap();
        let fresh = inner.mint(len);
        *inner.branch_mut(project, branch) = fresh;
    }

    pub fn history(&self, project: &ProjectId, branch: &str) -> Vec<CommitRecord> {
        self.inner.lock().unwrap().branch_mut(project, branch).clone()
    }

    pub fn fail_on_page(&self, page: usize) {
        self.inner.lock().unwrap().fail_on_page = Some(page);
    }

    pub fn fetches(&self) -> Vec<(String, usize)> {
        self.inner.lock().unwrap().fetches.clone()
    }

    pub fn clear_fetches(&self) {
        self.inner.lock().unwrap().fetches.clear();
    }
}

impl MemorySourceInner {
    fn mint(&mut self, count: usize) -> Vec<CommitRecord> {
        // Newest first: the highest serial leads
        let start = self.next_serial;
        self.next_serial += count;
        (start..self.next_serial).rev().map(commit).collect()
    }

    fn branch_mut(&mut self, project: &ProjectId, branch: &str) -> &mut Vec<CommitRecord> {
        self.projects
            .get_mut(project)
            .and_then(|p| p.branches.get_mut(branch))
            .unwrap_or_else(|| panic!("unknown branch {}@{}", project, branch))
    }
}

#[async_trait]
impl CommitSource for MemorySource {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn resolve_project(&self, project: &ProjectId) -> Result<ProjectInfo, RemoteError> {
        let inner = self.inner.lock().unwrap();
        let found = inner
            .projects
            .get(project)
            .ok_or_else(|| RemoteError::NotFound(project.to_string()))?;
        Ok(ProjectInfo {
            id: project.clone(),
            default_branch: found.default_branch.clone(),
        })
    }

    async fn resolve_branch(
        &self,
        project: &ProjectId,
        name: &str,
    ) -> Result<BranchInfo, RemoteError> {
        let inner = self.inner.lock().unwrap();
        inner
            .projects
            .get(project)
            .filter(|p| p.branches.contains_key(name))
            .map(|_| BranchInfo {
                name: name.to_string(),
            })
            .ok_or_else(|| RemoteError::NotFound(format!("{}@{}", project, name)))
    }

    async fn fetch_commit_page(
        &self,
        project: &ProjectId,
        branch: &str,
        page: usize,
    ) -> Result<Vec<CommitRecord>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches.push((branch.to_string(), page));

        if inner.fail_on_page == Some(page) {
            inner.fail_on_page = None;
            return Err(RemoteError::Network(format!("injected failure on page {}", page)));
        }

        let history = inner
            .projects
            .get(project)
            .and_then(|p| p.branches.get(branch))
            .ok_or_else(|| RemoteError::NotFound(format!("{}@{}", project, branch)))?;

        let start = (page - 1) * self.page_size;
        Ok(history
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect())
    }
}
