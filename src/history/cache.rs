//! Branch-scoped commit cache.
//!
//! Holds a newest-first prefix of one branch's remote history and keeps it
//! usable against a remote whose head keeps moving:
//! - `reconcile_head`: locate the cached head in the newest remote page(s),
//!   prepend whatever landed since, or drop the cache when it cannot be found
//! - `ensure_length`: extend backwards page by page until a target length is
//!   held or history runs out
//! - `page`: reconcile, extend, then slice
//!
//! Invariant: `commits` is empty or a contiguous prefix of the remote history
//! as of some observation, with no repeated sha. Length only shrinks through
//! the divergence reset.

use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::models::{CommitRecord, PageRequest, ProjectId};
use crate::remote::{CommitSource, RemoteError};

/// How far back `reconcile_head` looks for the cached head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Only the newest remote page.
    #[default]
    SinglePage,
    /// Up to `max_pages` newest remote pages.
    MultiPage { max_pages: usize },
}

impl ReconcilePolicy {
    pub fn from_pages(pages: usize) -> Self {
        if pages <= 1 {
            ReconcilePolicy::SinglePage
        } else {
            ReconcilePolicy::MultiPage { max_pages: pages }
        }
    }

    fn max_pages(self) -> usize {
        match self {
            ReconcilePolicy::SinglePage => 1,
            ReconcilePolicy::MultiPage { max_pages } => max_pages.max(1),
        }
    }
}

/// What `reconcile_head` did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing cached, nothing to compare.
    Empty,
    /// Cached head is still the remote head.
    Fresh,
    /// This many new commits were prepended.
    Prepended(usize),
    /// Cached head was not found; the cache was emptied.
    Reset,
}

#[derive(Debug, Clone)]
pub struct BranchCache {
    branch: String,
    /// Newest first
    commits: VecDeque<CommitRecord>,
    /// Shas present in `commits`
    shas: HashSet<String>,
}

impl BranchCache {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commits: VecDeque::new(),
            shas: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn commits(&self) -> impl Iterator<Item = &CommitRecord> {
        self.commits.iter()
    }

    fn clear(&mut self) {
        self.commits.clear();
        self.shas.clear();
    }

    fn push_back(&mut self, commit: CommitRecord) -> bool {
        if !self.shas.insert(commit.sha.clone()) {
            return false;
        }
        self.commits.push_back(commit);
        true
    }

    /// Bring the cached head up to date with the remote head.
    ///
    /// Scans the newest remote page(s) for `commits[0]`. A match at index `i`
    /// prepends the `i` newer commits; no match empties the cache.
    pub async fn reconcile_head(
        &mut self,
        source: &dyn CommitSource,
        project: &ProjectId,
        policy: ReconcilePolicy,
    ) -> std::result::Result<Reconciliation, RemoteError> {
        let Some(head) = self.commits.front().cloned() else {
            return Ok(Reconciliation::Empty);
        };

        let mut newer: Vec<CommitRecord> = Vec::new();
        let mut found = false;

        for page in 1..=policy.max_pages() {
            let fetched = source.fetch_commit_page(project, &self.branch, page).await?;
            if fetched.is_empty() {
                break;
            }
            match fetched.iter().position(|c| *c == head) {
                Some(i) => {
                    newer.extend(fetched.into_iter().take(i));
                    found = true;
                    break;
                }
                None => newer.extend(fetched),
            }
        }

        if !found {
            tracing::warn!(
                "Cache for {}@{} diverged from remote (head {} not found in {} page(s)); resetting {} cached commits",
                project,
                self.branch,
                head.sha,
                policy.max_pages(),
                self.commits.len()
            );
            self.clear();
            return Ok(Reconciliation::Reset);
        }

        if newer.is_empty() {
            return Ok(Reconciliation::Fresh);
        }

        let mut prepended = 0;
        for commit in newer.into_iter().rev() {
            if self.shas.insert(commit.sha.clone()) {
                self.commits.push_front(commit);
                prepended += 1;
            }
        }
        Ok(Reconciliation::Prepended(prepended))
    }

    /// Extend the cache backwards until it holds `target` commits or the
    /// remote history is exhausted.
    ///
    /// Pages are fetched one at a time. A partially covered page is fetched
    /// again and its already cached leading entries skipped. Commits appended
    /// before a failing fetch stay cached.
    pub async fn ensure_length(
        &mut self,
        source: &dyn CommitSource,
        project: &ProjectId,
        target: usize,
    ) -> std::result::Result<usize, RemoteError> {
        let have = self.len();
        if have >= target {
            return Ok(0);
        }

        let page_size = source.page_size().max(1);
        // A partial page is re-fetched; a full one moves us to the next
        let mut page = have / page_size + 1;
        let mut skip = have % page_size;
        let last_page = target.div_ceil(page_size);

        let mut appended = 0;
        while page <= last_page {
            let fetched = source.fetch_commit_page(project, &self.branch, page).await?;
            if fetched.is_empty() {
                tracing::debug!(
                    "History of {}@{} exhausted at page {} ({} commits cached)",
                    project,
                    self.branch,
                    page,
                    self.commits.len()
                );
                break;
            }

            for commit in fetched.into_iter().skip(skip) {
                if self.push_back(commit) {
                    appended += 1;
                }
            }
            skip = 0;
            page += 1;
        }

        Ok(appended)
    }

    /// Serve one page of history, refreshing and extending the cache first.
    ///
    /// The result is shorter than `request.size()` (possibly empty) when the
    /// remote history ends before the requested range does.
    pub async fn page(
        &mut self,
        source: &dyn CommitSource,
        project: &ProjectId,
        policy: ReconcilePolicy,
        request: PageRequest,
    ) -> Result<Vec<CommitRecord>> {
        if let Reconciliation::Prepended(count) =
            self.reconcile_head(source, project, policy).await?
        {
            tracing::debug!("{}@{}: {} new commits since last read", project, self.branch, count);
        }
        self.ensure_length(source, project, request.end()).await?;

        Ok(self
            .commits()
            .skip(request.start())
            .take(request.size())
            .cloned()
            .collect())
    }
}
