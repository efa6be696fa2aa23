//! Project/branch registry.
//!
//! Tracks the open project, its checked-out branch and one `BranchCache` per
//! branch ever referenced. Every cache access goes through here.
//!
//! Locking: registry bookkeeping sits behind short `std::sync::RwLock`
//! sections that are never held across an `.await`. Each branch cache has its
//! own `tokio::sync::Mutex`, held for the whole reconcile+extend of a read, so
//! reads of one branch serialize while other branches (and a project that has
//! since been replaced) proceed independently.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::history::cache::{BranchCache, ReconcilePolicy};
use crate::models::{BranchSummary, CommitRecord, PageRequest, ProjectId, ProjectSummary};
use crate::remote::{parse_project_reference, CommitSource, RemoteError};

pub type SharedRegistry = Arc<Registry>;

type SharedCache = Arc<Mutex<BranchCache>>;

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("Lock poisoned".to_string())
}

/// The open project and its per-branch caches.
pub struct ProjectHandle {
    id: ProjectId,
    current_branch: RwLock<Option<String>>,
    branches: RwLock<HashMap<String, SharedCache>>,
}

impl ProjectHandle {
    fn new(id: ProjectId) -> Self {
        Self {
            id,
            current_branch: RwLock::new(None),
            branches: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.current_branch.read().map_err(poisoned)?.clone())
    }

    /// Cache entry for `branch`, created empty on first reference.
    fn cache(&self, branch: &str) -> Result<SharedCache> {
        let mut branches = self.branches.write().map_err(poisoned)?;
        let cache = branches
            .entry(branch.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BranchCache::new(branch))));
        Ok(cache.clone())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.cache(branch)?;
        *self.current_branch.write().map_err(poisoned)? = Some(branch.to_string());
        Ok(())
    }

    pub fn branch_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.branches.read().map_err(poisoned)?.keys().cloned().collect())
    }

    /// Snapshot of the project's branches. Never waits on a branch that is
    /// busy serving a read; its length is reported as unknown instead.
    pub fn summary(&self) -> Result<ProjectSummary> {
        let current = self.current_branch()?;
        let mut branches: Vec<BranchSummary> = self
            .branches
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|(name, cache)| BranchSummary {
                name: name.clone(),
                is_current: current.as_deref() == Some(name.as_str()),
                cached_commits: cache.try_lock().ok().map(|cache| cache.len()),
            })
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ProjectSummary {
            project: self.id.to_string(),
            current_branch: current,
            branches,
        })
    }

    /// Read a page of the current branch.
    pub async fn page(
        &self,
        source: &dyn CommitSource,
        policy: ReconcilePolicy,
        request: PageRequest,
    ) -> Result<Vec<CommitRecord>> {
        let branch = self.current_branch()?.ok_or(AppError::NoActiveBranch)?;
        let cache = self.cache(&branch)?;

        let mut cache = cache.lock().await;
        cache.page(source, &self.id, policy, request).await
    }
}

/// Owner of the active project, shared by every facade.
pub struct Registry {
    source: Arc<dyn CommitSource>,
    policy: ReconcilePolicy,
    active: RwLock<Option<Arc<ProjectHandle>>>,
}

impl Registry {
    pub fn new(source: Arc<dyn CommitSource>, policy: ReconcilePolicy) -> Self {
        Self {
            source,
            policy,
            active: RwLock::new(None),
        }
    }

    /// Number of commits per remote page.
    pub fn page_size(&self) -> usize {
        self.source.page_size()
    }

    pub fn active(&self) -> Result<Option<Arc<ProjectHandle>>> {
        Ok(self.active.read().map_err(poisoned)?.clone())
    }

    fn require_active(&self) -> Result<Arc<ProjectHandle>> {
        self.active()?.ok_or(AppError::NoActiveProject)
    }

    /// Resolve `reference` and make it the active project.
    ///
    /// Re-opening the active project returns the existing handle untouched.
    /// Opening a different one discards every cached branch and checks out the
    /// remote's default branch, if it reports one.
    pub async fn open(&self, reference: &str) -> Result<Arc<ProjectHandle>> {
        let requested = parse_project_reference(reference)
            .ok_or_else(|| AppError::InvalidReference(reference.to_string()))?;

        let info = match self.source.resolve_project(&requested).await {
            Ok(info) => info,
            Err(RemoteError::NotFound(_)) => {
                return Err(AppError::ProjectNotFound(requested.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut active = self.active.write().map_err(poisoned)?;
        if let Some(handle) = active.as_ref().filter(|h| h.id == info.id) {
            tracing::debug!("Project {} already open", info.id);
            return Ok(handle.clone());
        }

        let handle = Arc::new(ProjectHandle::new(info.id));
        if let Some(branch) = info.default_branch.as_deref() {
            handle.checkout(branch)?;
        }
        tracing::info!(
            "Opened project {} (default branch: {})",
            handle.id,
            info.default_branch.as_deref().unwrap_or("none")
        );

        *active = Some(handle.clone());
        Ok(handle)
    }

    /// `open`, reporting only success.
    pub async fn open_project(&self, reference: &str) -> bool {
        match self.open(reference).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to open project {}: {}", reference, e);
                false
            }
        }
    }

    /// Make `name` the current branch after confirming it exists remotely.
    /// An existing cache for the branch is kept.
    pub async fn checkout(&self, name: &str) -> Result<()> {
        let handle = self.require_active()?;

        match self.source.resolve_branch(&handle.id, name).await {
            Ok(branch) => {
                handle.checkout(&branch.name)?;
                tracing::info!("Checked out {}@{}", handle.id(), branch.name);
                Ok(())
            }
            Err(RemoteError::NotFound(_)) => Err(AppError::BranchNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// `checkout`, reporting only success.
    pub async fn checkout_branch(&self, name: &str) -> bool {
        match self.checkout(name).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to check out {}: {}", name, e);
                false
            }
        }
    }

    /// Every branch with a cache entry; empty when no project is open.
    pub fn list_branches(&self) -> BTreeSet<String> {
        match self.active() {
            Ok(Some(handle)) => handle.branch_names().unwrap_or_default(),
            _ => BTreeSet::new(),
        }
    }

    pub fn summary(&self) -> Result<ProjectSummary> {
        self.require_active()?.summary()
    }

    /// Branch summaries of the open project; empty when none is open.
    pub fn branch_summaries(&self) -> Result<Vec<BranchSummary>> {
        match self.active()? {
            Some(project) => Ok(project.summary()?.branches),
            None => Ok(Vec::new()),
        }
    }

    /// Page `page` (1-based) of `size` commits from the current branch.
    pub async fn get_page(&self, page: i64, size: i64) -> Result<Vec<CommitRecord>> {
        let request = PageRequest::new(page, size)?;
        let handle = self.require_active()?;
        self.page_of(&handle, request).await
    }

    /// Page of a specific project handle, unaffected by later project switches.
    pub async fn page_of(
        &self,
        handle: &ProjectHandle,
        request: PageRequest,
    ) -> Result<Vec<CommitRecord>> {
        handle.page(self.source.as_ref(), self.policy, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemorySource;

    fn spark() -> ProjectId {
        ProjectId::new("apache", "spark")
    }

    fn flink() -> ProjectId {
        ProjectId::new("apache", "flink")
    }

    fn setup() -> (MemorySource, Registry) {
        let source = MemorySource::new(30)
            .with_project(&spark(), "main", 100)
            .with_branch(&spark(), "dev", 80)
            .with_project(&flink(), "master", 40)
            .with_bare_project(&ProjectId::new("octo", "empty"));
        let registry = Registry::new(Arc::new(source.clone()), ReconcilePolicy::SinglePage);
        (source, registry)
    }

    async fn cached_len(registry: &Registry, branch: &str) -> usize {
        let handle = registry.active().unwrap().unwrap();
        let cache = handle.cache(branch).unwrap();
        let len = cache.lock().await.len();
        len
    }

    #[tokio::test]
    async fn open_checks_out_default_branch() {
        let (_, registry) = setup();

        assert!(registry.open_project("https://github.com/apache/spark.git").await);

        let handle = registry.active().unwrap().unwrap();
        assert_eq!(handle.id(), &spark());
        assert_eq!(handle.current_branch().unwrap().as_deref(), Some("main"));
        assert_eq!(
            registry.list_branches(),
            BTreeSet::from(["main".to_string()])
        );
    }

    #[tokio::test]
    async fn open_without_default_branch_leaves_no_current_branch() {
        let (_, registry) = setup();

        assert!(registry.open_project("octo/empty").await);
        assert!(registry.list_branches().is_empty());
        assert!(matches!(
            registry.get_page(1, 5).await,
            Err(AppError::NoActiveBranch)
        ));
    }

    #[tokio::test]
    async fn open_rejects_unknown_and_malformed_references() {
        let (_, registry) = setup();

        assert!(!registry.open_project("apache/missing").await);
        assert!(!registry.open_project("not a reference").await);
        assert!(matches!(
            registry.open("https://gitlab.com/apache/spark").await,
            Err(AppError::InvalidReference(_))
        ));
        assert!(matches!(
            registry.open("apache/missing").await,
            Err(AppError::ProjectNotFound(_))
        ));
        assert!(registry.active().unwrap().is_none());
    }

    #[tokio::test]
    async fn reopening_same_project_keeps_state() {
        let (_, registry) = setup();

        registry.open("apache/spark").await.unwrap();
        registry.checkout("dev").await.unwrap();
        registry.get_page(1, 5).await.unwrap();

        let handle = registry.open("git@github.com:apache/spark.git").await.unwrap();

        assert_eq!(handle.current_branch().unwrap().as_deref(), Some("dev"));
        assert_eq!(cached_len(&registry, "dev").await, 30);
    }

    #[tokio::test]
    async fn opening_other_project_discards_caches() {
        let (_, registry) = setup();

        registry.open("apache/spark").await.unwrap();
        registry.checkout("dev").await.unwrap();
        registry.open("apache/flink").await.unwrap();

        assert_eq!(
            registry.list_branches(),
            BTreeSet::from(["master".to_string()])
        );
    }

    #[tokio::test]
    async fn checkout_requires_project_and_remote_branch() {
        let (_, registry) = setup();

        assert!(!registry.checkout_branch("main").await);
        assert!(matches!(
            registry.checkout("main").await,
            Err(AppError::NoActiveProject)
        ));

        registry.open("apache/spark").await.unwrap();
        assert!(matches!(
            registry.checkout("nope").await,
            Err(AppError::BranchNotFound(_))
        ));
        assert!(registry.checkout_branch("dev").await);
        assert_eq!(
            registry.list_branches(),
            BTreeSet::from(["dev".to_string(), "main".to_string()])
        );
    }

    #[tokio::test]
    async fn checkout_keeps_existing_cache() {
        let (_, registry) = setup();

        registry.open("apache/spark").await.unwrap();
        registry.get_page(1, 37).await.unwrap();
        registry.checkout("dev").await.unwrap();
        registry.checkout("main").await.unwrap();

        assert_eq!(cached_len(&registry, "main").await, 60);
    }

    #[tokio::test]
    async fn get_page_requires_open_project() {
        let (_, registry) = setup();

        assert!(matches!(
            registry.get_page(1, 5).await,
            Err(AppError::NoActiveProject)
        ));
        assert!(matches!(
            registry.get_page(0, 5).await,
            Err(AppError::InvalidPageRequest { .. })
        ));
    }

    #[tokio::test]
    async fn branches_are_isolated() {
        let (source, registry) = setup();

        registry.open("apache/spark").await.unwrap();
        registry.get_page(1, 45).await.unwrap();
        registry.checkout("dev").await.unwrap();
        registry.get_page(1, 5).await.unwrap();

        // Divergence on dev must not touch main
        source.rewrite(&spark(), "dev", 80);
        registry.get_page(1, 5).await.unwrap();

        assert_eq!(cached_len(&registry, "main").await, 60);
        assert_eq!(cached_len(&registry, "dev").await, 30);
        assert_eq!(
            registry.get_page(1, 5).await.unwrap(),
            source.history(&spark(), "dev")[..5]
        );
    }

    #[tokio::test]
    async fn repeated_reads_are_served_from_cache() {
        let (source, registry) = setup();
        registry.open("apache/spark").await.unwrap();

        let first = registry.get_page(1, 5).await.unwrap();
        assert_eq!(source.fetches(), vec![("main".to_string(), 1)]);
        assert_eq!(first, source.history(&spark(), "main")[..5]);

        source.clear_fetches();
        let second = registry.get_page(1, 5).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached_len(&registry, "main").await, 30);
        // Only the freshness check goes to the remote
        assert_eq!(source.fetches(), vec![("main".to_string(), 1)]);
    }

    #[tokio::test]
    async fn new_remote_commits_show_up_on_next_read() {
        let (source, registry) = setup();
        registry.open("apache/spark").await.unwrap();
        registry.get_page(1, 5).await.unwrap();

        source.advance(&spark(), "main", 3);
        let page = registry.get_page(1, 5).await.unwrap();

        assert_eq!(page, source.history(&spark(), "main")[..5]);
        assert_eq!(cached_len(&registry, "main").await, 33);
    }

    #[tokio::test]
    async fn remote_failure_is_propagated() {
        let (source, registry) = setup();
        registry.open("apache/spark").await.unwrap();

        source.fail_on_page(1);
        assert!(matches!(
            registry.get_page(1, 5).await,
            Err(AppError::RemoteFetchFailed(_))
        ));
        assert_eq!(registry.get_page(1, 5).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn concurrent_reads_on_one_branch_serialize() {
        let (source, registry) = setup();
        let registry = Arc::new(registry);
        registry.open("apache/spark").await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_page(1, 60).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().len(), 60);
        }

        assert_eq!(cached_len(&registry, "main").await, 60);
        let extensions = source
            .fetches()
            .into_iter()
            .filter(|(_, page)| *page == 2)
            .count();
        assert_eq!(extensions, 1);
    }

    #[tokio::test]
    async fn summary_reports_cached_lengths() {
        let (_, registry) = setup();
        assert!(matches!(registry.summary(), Err(AppError::NoActiveProject)));
        assert!(registry.branch_summaries().unwrap().is_empty());

        registry.open("apache/spark").await.unwrap();
        registry.get_page(2, 20).await.unwrap();
        registry.checkout("dev").await.unwrap();

        let summary = registry.summary().unwrap();
        assert_eq!(summary.project, "apache/spark");
        assert_eq!(summary.current_branch.as_deref(), Some("dev"));
        assert_eq!(
            summary.branches,
            vec![
                BranchSummary {
                    name: "dev".to_string(),
                    is_current: true,
                    cached_commits: Some(0),
                },
                BranchSummary {
                    name: "main".to_string(),
                    is_current: false,
                    cached_commits: Some(60),
                },
            ]
        );
        assert_eq!(registry.branch_summaries().unwrap(), summary.branches);
    }

    #[tokio::test]
    async fn summary_does_not_wait_for_busy_branch() {
        let (_, registry) = setup();
        registry.open("apache/spark").await.unwrap();
        registry.get_page(1, 5).await.unwrap();
        registry.checkout("dev").await.unwrap();

        let handle = registry.active().unwrap().unwrap();
        let main = handle.cache("main").unwrap();
        let _reading = main.lock().await;

        let branches = registry.branch_summaries().unwrap();
        assert_eq!(branches[0].name, "dev");
        assert_eq!(branches[0].cached_commits, Some(0));
        assert_eq!(branches[1].name, "main");
        assert_eq!(branches[1].cached_commits, None);
    }
}
