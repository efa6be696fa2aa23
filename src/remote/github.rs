//! GitHub REST implementation of `CommitSource`.
//!
//! Endpoints used:
//! - `GET /repos/{owner}/{repo}`: canonical name and default branch
//! - `GET /repos/{owner}/{repo}/branches/{branch}`: branch existence
//! - `GET /repos/{owner}/{repo}/commits?sha=&page=&per_page=`: history pages
//!
//! Requests are unauthenticated; rate limiting surfaces as `RemoteError::Api`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

use super::{CommitSource, RemoteError};
use crate::models::{BranchInfo, CommitRecord, ProjectId, ProjectInfo};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT_VALUE: &str = "commit-viewer";

/// Placeholder for fields the API omits.
const MISSING: &str = "n/a";

pub struct GitHubSource {
    client: Client,
    api_base: String,
    page_size: usize,
}

impl std::fmt::Debug for GitHubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSource")
            .field("api_base", &self.api_base)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl GitHubSource {
    pub fn new(api_base: impl Into<String>, page_size: usize) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .default_headers(default_headers())
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            page_size,
        })
    }

    /// Build `{api_base}/repos/{owner}/{repo}/{segments...}` with every
    /// segment percent-encoded on its own.
    fn repo_url(&self, project: &ProjectId, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| RemoteError::Network(format!("invalid API base {}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Network(format!("invalid API base {}", self.api_base)))?
            .pop_if_empty()
            .push("repos")
            .push(&project.owner)
            .push(&project.repository)
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, RemoteError> {
        tracing::debug!("Request: {}", url);
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))
    }
}

#[async_trait]
impl CommitSource for GitHubSource {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn resolve_project(&self, project: &ProjectId) -> Result<ProjectInfo, RemoteError> {
        let response = self.get(self.repo_url(project, &[])?).await?;
        let repo: GitHubRepository = handle_response(response, &project.to_string()).await?;

        // full_name reflects renames and the remote's own casing
        let id = repo
            .full_name
            .as_deref()
            .and_then(|name| name.split_once('/'))
            .map(|(owner, name)| ProjectId::new(owner, name))
            .unwrap_or_else(|| project.clone());

        Ok(ProjectInfo {
            id,
            default_branch: repo.default_branch,
        })
    }

    async fn resolve_branch(
        &self,
        project: &ProjectId,
        name: &str,
    ) -> Result<BranchInfo, RemoteError> {
        let response = self.get(self.repo_url(project, &["branches", name])?).await?;
        let branch: GitHubBranch =
            handle_response(response, &format!("{}@{}", project, name)).await?;
        Ok(BranchInfo { name: branch.name })
    }

    async fn fetch_commit_page(
        &self,
        project: &ProjectId,
        branch: &str,
        page: usize,
    ) -> Result<Vec<CommitRecord>, RemoteError> {
        let mut url = self.repo_url(project, &["commits"])?;
        url.query_pairs_mut()
            .append_pair("sha", branch)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.page_size.to_string());

        let response = self.get(url).await?;

        // An empty repository has no history rather than a missing one
        if response.status() == StatusCode::CONFLICT {
            return Ok(Vec::new());
        }

        let commits: Vec<GitHubCommit> =
            handle_response(response, &format!("{}@{}", project, branch)).await?;
        Ok(commits.into_iter().map(CommitRecord::from).collect())
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(
        "X-GitHub-Api-Version",
        HeaderValue::from_static("2022-11-28"),
    );
    headers
}

async fn handle_response<T: for<'de> Deserialize<'de>>(
    response: Response,
    subject: &str,
) -> Result<T, RemoteError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(format!("Failed to parse response: {}", e)));
    }

    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(subject.to_string()));
    }

    let message = match response.json::<GitHubErrorResponse>().await {
        Ok(err) => err.message,
        Err(_) => "Unknown error".to_string(),
    };
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    full_name: Option<String>,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubBranch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: Option<String>,
    commit: Option<GitHubCommitBody>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitBody {
    message: Option<String>,
    committer: Option<GitHubSignature>,
}

#[derive(Debug, Deserialize)]
struct GitHubSignature {
    name: Option<String>,
    date: Option<String>,
}

impl From<GitHubCommit> for CommitRecord {
    fn from(commit: GitHubCommit) -> Self {
        let or_missing = |value: Option<String>| value.unwrap_or_else(|| MISSING.to_string());

        let (message, committer) = match commit.commit {
            Some(body) => (body.message, body.committer),
            None => (None, None),
        };
        let (author, date) = match committer {
            Some(signature) => (signature.name, signature.date),
            None => (None, None),
        };

        CommitRecord::new(
            or_missing(commit.sha),
            or_missing(author),
            or_missing(date),
            or_missing(message),
        )
    }
}
