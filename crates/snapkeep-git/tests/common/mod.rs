#![allow(dead_code)]
//! In-memory doubles for the VCS layer and the hosting API.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use snapkeep_git::vcs::{CheckoutTarget, HeadState, IndexEntry, RemoteDirection, WorkingTreeState};
use snapkeep_git::{
    AutoConfirm, EngineConfig, HostingApi, HostingError, RepoUrl, SnapshotEngine, Vcs, VcsError,
    VcsErrorKind,
};
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const DEST_URL: &str = "https://github.com/acme/backups.git";
pub const OTHER_URL: &str = "git@github.com:acme/elsewhere.git";
pub const ALIAS: &str = "snapkeep-backup";

/// Branch set of the destination repository, shared by both fakes.
pub type RemoteBranches = Arc<Mutex<BTreeSet<String>>>;

#[derive(Debug, Default)]
struct RepoState {
    is_repo: bool,
    head: Option<HeadState>,
    local_branches: BTreeSet<String>,
    changed: Vec<String>,
    staged: Vec<String>,
    index: Vec<IndexEntry>,
    remotes: BTreeMap<String, String>,
    fetched: BTreeSet<String>,
    stashes: Vec<(String, Vec<String>)>,
    commits: Vec<(String, String)>,
    trees: Vec<Vec<String>>,
    batches: Vec<usize>,
    untracked: Vec<String>,
    calls: Vec<String>,
    failures: HashMap<String, VcsErrorKind>,
    pop_conflict: bool,
}

/// A repository that lives in memory. Pushes land in the shared remote
/// branch set.
pub struct FakeVcs {
    state: Mutex<RepoState>,
    remote: RemoteBranches,
    push_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeVcs {
    /// An initialized repository on `main` with one commit and a clean tree.
    pub fn new(remote: RemoteBranches) -> Self {
        let mut state = RepoState {
            is_repo: true,
            head: Some(HeadState::Branch("main".to_string())),
            ..Default::default()
        };
        state.local_branches.insert("main".to_string());
        Self {
            state: Mutex::new(state),
            remote,
            push_gate: Mutex::new(None),
        }
    }

    /// A directory that is not under version control.
    pub fn uninitialized(remote: RemoteBranches) -> Self {
        let vcs = Self::new(remote);
        {
            let mut s = vcs.state.lock();
            s.is_repo = false;
            s.head = None;
            s.local_branches.clear();
        }
        vcs
    }

    pub fn set_changed(&self, paths: &[&str]) {
        self.state.lock().changed = paths.iter().map(|p| p.to_string()).collect();
    }

    pub fn changed(&self) -> Vec<String> {
        self.state.lock().changed.clone()
    }

    pub fn set_index(&self, entries: Vec<IndexEntry>) {
        self.state.lock().index = entries;
    }

    pub fn add_local_branch(&self, name: &str) {
        self.state.lock().local_branches.insert(name.to_string());
    }

    pub fn add_remote_entry(&self, name: &str, url: &str) {
        self.state
            .lock()
            .remotes
            .insert(name.to_string(), url.to_string());
    }

    /// Makes every call to `op` fail with `kind` until cleared.
    pub fn fail(&self, op: &str, kind: VcsErrorKind) {
        self.state.lock().failures.insert(op.to_string(), kind);
    }

    pub fn clear_failure(&self, op: &str) {
        self.state.lock().failures.remove(op);
    }

    pub fn set_pop_conflict(&self, conflict: bool) {
        self.state.lock().pop_conflict = conflict;
    }

    /// Holds every push until a permit is added to the returned semaphore.
    pub fn gate_pushes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.push_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn head(&self) -> Option<HeadState> {
        self.state.lock().head.clone()
    }

    pub fn remotes(&self) -> BTreeMap<String, String> {
        self.state.lock().remotes.clone()
    }

    pub fn stashes(&self) -> Vec<String> {
        self.state.lock().stashes.iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn commits(&self) -> Vec<(String, String)> {
        self.state.lock().commits.clone()
    }

    /// Paths recorded by each commit, oldest first.
    pub fn trees(&self) -> Vec<Vec<String>> {
        self.state.lock().trees.clone()
    }

    pub fn batches(&self) -> Vec<usize> {
        self.state.lock().batches.clone()
    }

    pub fn untracked(&self) -> Vec<String> {
        self.state.lock().untracked.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == op).count()
    }

    fn enter(&self, op: &str) -> Result<parking_lot::MutexGuard<'_, RepoState>, VcsError> {
        let mut state = self.state.lock();
        state.calls.push(op.to_string());
        match state.failures.get(op) {
            Some(kind) => Err(VcsError::new(*kind, format!("injected {op} failure"))),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn is_repository(&self, _workdir: &Path) -> Result<bool, VcsError> {
        Ok(self.enter("is_repository")?.is_repo)
    }

    async fn init(&self, _workdir: &Path) -> Result<(), VcsError> {
        let mut s = self.enter("init")?;
        s.is_repo = true;
        s.head = Some(HeadState::Unborn);
        Ok(())
    }

    async fn status(&self, _workdir: &Path) -> Result<WorkingTreeState, VcsError> {
        let s = self.enter("status")?;
        Ok(WorkingTreeState {
            head: s.head.clone().unwrap_or(HeadState::Unborn),
            changed_paths: s.changed.clone(),
        })
    }

    async fn checkout(&self, _workdir: &Path, target: CheckoutTarget<'_>) -> Result<(), VcsError> {
        let mut s = self.enter("checkout")?;
        match target {
            CheckoutTarget::Create(branch) => {
                if !s.local_branches.insert(branch.to_string()) {
                    return Err(VcsError::new(
                        VcsErrorKind::AlreadyExists,
                        format!("a branch named '{branch}' already exists"),
                    ));
                }
                s.head = Some(HeadState::Branch(branch.to_string()));
            },
            CheckoutTarget::Force {
                branch,
                start_point,
            } => {
                let fetched = s
                    .fetched
                    .iter()
                    .any(|b| start_point == format!("refs/remotes/{ALIAS}/{b}"));
                if !fetched {
                    return Err(VcsError::new(
                        VcsErrorKind::NotFound,
                        format!("'{start_point}' is not a valid ref"),
                    ));
                }
                s.local_branches.insert(branch.to_string());
                s.head = Some(HeadState::Branch(branch.to_string()));
                s.changed.clear();
            },
        }
        Ok(())
    }

    async fn add(&self, _workdir: &Path, paths: &[String]) -> Result<(), VcsError> {
        let mut s = self.enter("add")?;
        s.batches.push(paths.len());
        s.changed.retain(|p| !paths.contains(p));
        for path in paths {
            if !s.staged.contains(path) {
                s.staged.push(path.clone());
            }
        }
        Ok(())
    }

    async fn index_entries(&self, _workdir: &Path) -> Result<Vec<IndexEntry>, VcsError> {
        Ok(self.enter("index_entries")?.index.clone())
    }

    async fn untrack(&self, _workdir: &Path, path: &str) -> Result<(), VcsError> {
        let mut s = self.enter("untrack")?;
        let gitlink = s
            .index
            .iter()
            .any(|e| e.path == path && e.is_gitlink());
        s.index.retain(|e| e.path != path);
        s.untracked.push(path.to_string());
        // Status now shows a staged deletion plus the untracked working copy.
        s.changed.push(path.to_string());
        s.changed.push(if gitlink {
            format!("{path}/")
        } else {
            path.to_string()
        });
        Ok(())
    }

    async fn commit(&self, _workdir: &Path, message: &str, allow_empty: bool) -> Result<(), VcsError> {
        let mut s = self.enter("commit")?;
        if s.staged.is_empty() && !allow_empty {
            return Err(VcsError::failed("nothing to commit, working tree clean"));
        }
        let branch = match &s.head {
            Some(HeadState::Branch(b)) => b.clone(),
            _ => return Err(VcsError::failed("not on a branch")),
        };
        s.commits.push((branch, message.to_string()));
        let tree = std::mem::take(&mut s.staged);
        s.trees.push(tree);
        Ok(())
    }

    async fn push(
        &self,
        _workdir: &Path,
        remote: &str,
        branch: &str,
        _set_upstream: bool,
    ) -> Result<(), VcsError> {
        {
            let s = self.enter("push")?;
            if !s.remotes.contains_key(remote) {
                return Err(VcsError::new(
                    VcsErrorKind::NotFound,
                    format!("no such remote '{remote}'"),
                ));
            }
        }

        let gate = self.push_gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| VcsError::failed("push gate closed"))?;
        }

        self.remote.lock().insert(branch.to_string());
        Ok(())
    }

    async fn fetch(&self, _workdir: &Path, remote: &str, branch: Option<&str>) -> Result<(), VcsError> {
        let mut s = self.enter("fetch")?;
        if !s.remotes.contains_key(remote) {
            return Err(VcsError::new(
                VcsErrorKind::NotFound,
                format!("no such remote '{remote}'"),
            ));
        }
        let remote_branches = self.remote.lock().clone();
        match branch {
            Some(b) if !remote_branches.contains(b) => Err(VcsError::new(
                VcsErrorKind::NotFound,
                format!("couldn't find remote ref {b}"),
            )),
            Some(b) => {
                s.fetched.insert(b.to_string());
                Ok(())
            },
            None => {
                s.fetched.extend(remote_branches);
                Ok(())
            },
        }
    }

    async fn stash_push(&self, _workdir: &Path, label: &str) -> Result<(), VcsError> {
        let mut s = self.enter("stash_push")?;
        let saved = std::mem::take(&mut s.changed);
        s.stashes.push((label.to_string(), saved));
        Ok(())
    }

    async fn stash_pop(&self, _workdir: &Path, label: &str) -> Result<(), VcsError> {
        let mut s = self.enter("stash_pop")?;
        if s.pop_conflict {
            return Err(VcsError::new(
                VcsErrorKind::Conflict,
                "CONFLICT (content): Merge conflict in src/lib.rs",
            ));
        }
        let pos = s
            .stashes
            .iter()
            .position(|(l, _)| l == label)
            .ok_or_else(|| VcsError::new(VcsErrorKind::NotFound, "no such stash"))?;
        let (_, saved) = s.stashes.remove(pos);
        s.changed = saved;
        Ok(())
    }

    async fn remote_names(&self, _workdir: &Path) -> Result<Vec<String>, VcsError> {
        Ok(self.enter("remote_names")?.remotes.keys().cloned().collect())
    }

    async fn remote_url(
        &self,
        _workdir: &Path,
        name: &str,
        _direction: RemoteDirection,
    ) -> Result<Option<String>, VcsError> {
        Ok(self.enter("remote_url")?.remotes.get(name).cloned())
    }

    async fn add_remote(&self, _workdir: &Path, name: &str, url: &str) -> Result<(), VcsError> {
        let mut s = self.enter("add_remote")?;
        if s.remotes.contains_key(name) {
            return Err(VcsError::new(
                VcsErrorKind::AlreadyExists,
                format!("remote {name} already exists"),
            ));
        }
        s.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    async fn remove_remote(&self, _workdir: &Path, name: &str) -> Result<(), VcsError> {
        let mut s = self.enter("remove_remote")?;
        s.remotes
            .remove(name)
            .map(drop)
            .ok_or_else(|| VcsError::new(VcsErrorKind::NotFound, format!("no such remote '{name}'")))
    }
}

/// A hosting service whose destination branches are the shared set.
pub struct FakeHosting {
    pub branches: RemoteBranches,
    pub authenticated: AtomicBool,
    pub reauth_succeeds: AtomicBool,
    pub reauth_calls: AtomicUsize,
    pub list_fails: AtomicBool,
    pub exists: AtomicBool,
    pub unreachable: AtomicBool,
    pub create_fails: AtomicBool,
    pub created: Mutex<Vec<String>>,
}

impl FakeHosting {
    pub fn new(branches: RemoteBranches) -> Self {
        Self {
            branches,
            authenticated: AtomicBool::new(true),
            reauth_succeeds: AtomicBool::new(true),
            reauth_calls: AtomicUsize::new(0),
            list_fails: AtomicBool::new(false),
            exists: AtomicBool::new(true),
            unreachable: AtomicBool::new(false),
            create_fails: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        }
    }

    fn reachable(&self) -> Result<(), HostingError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(HostingError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn seed(&self, names: &[&str]) {
        self.branches
            .lock()
            .extend(names.iter().map(|n| n.to_string()));
    }
}

#[async_trait]
impl HostingApi for FakeHosting {
    async fn list_branches(&self, _repo: &RepoUrl, prefix: &str) -> Result<Vec<String>, HostingError> {
        self.reachable()?;
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(HostingError::Transport("connection reset".to_string()));
        }
        if !self.exists.load(Ordering::SeqCst) {
            return Err(HostingError::NotFound("acme/backups".to_string()));
        }
        Ok(self
            .branches
            .lock()
            .iter()
            .filter(|b| b.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn create_private_repository(&self, name: &str) -> Result<RepoUrl, HostingError> {
        self.reachable()?;
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(HostingError::Http {
                status: 422,
                message: "name already exists on this account".to_string(),
            });
        }
        self.created.lock().push(name.to_string());
        self.exists.store(true, Ordering::SeqCst);
        RepoUrl::parse(&format!("https://github.com/acme/{name}.git"))
            .map_err(|e| HostingError::Transport(e.to_string()))
    }

    async fn repository_exists(&self, _repo: &RepoUrl) -> Result<bool, HostingError> {
        self.reachable()?;
        Ok(self.exists.load(Ordering::SeqCst))
    }

    async fn authenticated_user(&self) -> Result<String, HostingError> {
        self.reachable()?;
        if self.authenticated.load(Ordering::SeqCst) {
            Ok("acme".to_string())
        } else {
            Err(HostingError::Unauthorized("bad credentials".to_string()))
        }
    }

    async fn reauthenticate(&self) -> Result<String, HostingError> {
        self.reauth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reauth_succeeds.load(Ordering::SeqCst) {
            self.authenticated.store(true, Ordering::SeqCst);
            Ok("acme".to_string())
        } else {
            Err(HostingError::Unauthorized("bad credentials".to_string()))
        }
    }
}

/// A workspace directory wired to both fakes.
pub struct Harness {
    pub dir: TempDir,
    pub vcs: Arc<FakeVcs>,
    pub hosting: Arc<FakeHosting>,
}

impl Harness {
    pub fn new() -> Self {
        let remote = RemoteBranches::default();
        Self::with_vcs(FakeVcs::new(Arc::clone(&remote)), remote)
    }

    pub fn with_vcs(vcs: FakeVcs, remote: RemoteBranches) -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
            vcs: Arc::new(vcs),
            hosting: Arc::new(FakeHosting::new(remote)),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> EngineConfig {
        self.config_builder().build().expect("valid config")
    }

    pub fn config_builder(&self) -> snapkeep_git::EngineConfigBuilder {
        EngineConfig::builder()
            .workspace(self.path())
            .destination(DEST_URL)
    }

    pub fn engine(&self) -> SnapshotEngine {
        self.engine_with(&self.config(), true)
    }

    pub fn engine_with(&self, config: &EngineConfig, confirm_init: bool) -> SnapshotEngine {
        SnapshotEngine::new(
            config,
            Arc::clone(&self.vcs) as Arc<dyn Vcs>,
            Arc::clone(&self.hosting) as Arc<dyn HostingApi>,
            Arc::new(AutoConfirm(confirm_init)),
        )
        .expect("engine")
    }

    pub fn remote_branches(&self) -> Vec<String> {
        self.hosting.branches.lock().iter().cloned().collect()
    }
}
