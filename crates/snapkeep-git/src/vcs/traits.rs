//! VCS command layer trait and the values it exchanges.

use std::path::Path;

use async_trait::async_trait;

use crate::error::VcsError;

/// What `HEAD` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// On a branch with at least one commit.
    Branch(String),
    /// Detached at a commit.
    Detached,
    /// A fresh repository with no commits yet.
    Unborn,
}

/// A fresh reading of the working tree. Never cached between operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTreeState {
    /// Current head.
    pub head: HeadState,
    /// Paths with staged, unstaged or untracked changes. Renames contribute
    /// both the old and the new path.
    pub changed_paths: Vec<String>,
}

impl WorkingTreeState {
    /// A clean tree on the given head.
    pub fn clean(head: HeadState) -> Self {
        Self {
            head,
            changed_paths: Vec::new(),
        }
    }

    /// Returns true if there is anything to stage or shelve.
    pub fn is_dirty(&self) -> bool {
        !self.changed_paths.is_empty()
    }

    /// Returns the current branch name, if on one.
    pub fn branch(&self) -> Option<&str> {
        match &self.head {
            HeadState::Branch(name) => Some(name),
            _ => None,
        }
    }
}

/// One entry of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// File mode, e.g. `0o100644`.
    pub mode: u32,
    /// Path relative to the workspace root.
    pub path: String,
}

impl IndexEntry {
    /// Mode of a regular, non-executable file.
    pub const FILE_MODE: u32 = 0o100644;

    /// Mode of an entry that records a sub-project commit.
    pub const GITLINK_MODE: u32 = 0o160000;

    /// Returns true if this entry is a sub-project reference.
    pub fn is_gitlink(&self) -> bool {
        self.mode == Self::GITLINK_MODE
    }
}

/// Target of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutTarget<'a> {
    /// Create a new branch at the current position and switch to it.
    Create(&'a str),
    /// Create or reset `branch` to `start_point`, discarding local changes
    /// to tracked files.
    Force {
        branch: &'a str,
        start_point: &'a str,
    },
}

/// Which URL of a remote to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDirection {
    Fetch,
    Push,
}

/// Version control operations the engine relies on.
///
/// Every method takes the workspace root and reads repository state fresh.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Returns true if `workdir` is inside a repository.
    async fn is_repository(&self, workdir: &Path) -> Result<bool, VcsError>;

    /// Creates a repository in `workdir`.
    async fn init(&self, workdir: &Path) -> Result<(), VcsError>;

    /// Reads head and changed paths.
    async fn status(&self, workdir: &Path) -> Result<WorkingTreeState, VcsError>;

    /// Switches branches.
    async fn checkout(&self, workdir: &Path, target: CheckoutTarget<'_>) -> Result<(), VcsError>;

    /// Stages a batch of paths, including deletions.
    async fn add(&self, workdir: &Path, paths: &[String]) -> Result<(), VcsError>;

    /// Lists the index.
    async fn index_entries(&self, workdir: &Path) -> Result<Vec<IndexEntry>, VcsError>;

    /// Removes a path from the index, keeping the working copy.
    async fn untrack(&self, workdir: &Path, path: &str) -> Result<(), VcsError>;

    /// Records a commit.
    async fn commit(&self, workdir: &Path, message: &str, allow_empty: bool)
    -> Result<(), VcsError>;

    /// Pushes a branch.
    async fn push(
        &self,
        workdir: &Path,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), VcsError>;

    /// Fetches from a remote, optionally a single branch.
    async fn fetch(&self, workdir: &Path, remote: &str, branch: Option<&str>)
    -> Result<(), VcsError>;

    /// Shelves all local changes, untracked files included, under `label`.
    async fn stash_push(&self, workdir: &Path, label: &str) -> Result<(), VcsError>;

    /// Reapplies and drops the stash carrying `label`. A conflict is reported
    /// as [`crate::error::VcsErrorKind::Conflict`] and leaves the stash in place.
    async fn stash_pop(&self, workdir: &Path, label: &str) -> Result<(), VcsError>;

    /// Lists remote names.
    async fn remote_names(&self, workdir: &Path) -> Result<Vec<String>, VcsError>;

    /// Returns a remote's URL, or `None` if the remote does not exist.
    async fn remote_url(
        &self,
        workdir: &Path,
        name: &str,
        direction: RemoteDirection,
    ) -> Result<Option<String>, VcsError>;

    /// Adds a remote.
    async fn add_remote(&self, workdir: &Path, name: &str, url: &str) -> Result<(), VcsError>;

    /// Removes a remote.
    async fn remove_remote(&self, workdir: &Path, name: &str) -> Result<(), VcsError>;
}
