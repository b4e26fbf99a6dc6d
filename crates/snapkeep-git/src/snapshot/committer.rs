//! Captures the working tree as a new snapshot branch and pushes it.

use std::path::Path;
use std::sync::Arc;

use snapkeep_core::{
    Phase, Result, SnapshotError, SnapshotName, SnapshotNamer, SnapshotResult, SnapshotTimestamp,
    SnapshotVersion, VersionAllocator,
};
use tracing::{debug, info, warn};

use super::guard::IndexRecoveryGuard;
use super::prompt::InitPrompt;
use crate::config::EngineConfig;
use crate::destination::{BackupDestination, RemoteBinder};
use crate::error::{HostingError, VcsErrorKind, VcsResultExt};
use crate::hosting::{HostingApi, ensure_authenticated};
use crate::vcs::{CheckoutTarget, HeadState, RemoteDirection, Vcs};

/// Prefix shared by every snapshot branch name.
pub(crate) const SNAPSHOT_PREFIX: &str = "v";

/// Runs one snapshot from precondition checks to the final fetch.
///
/// Preconditions fail with configuration, cancellation or authentication
/// errors. From branch creation onward every failure is a single git error
/// naming the phase; the local branch is left in place for inspection.
pub struct SnapshotCommitter {
    vcs: Arc<dyn Vcs>,
    hosting: Arc<dyn HostingApi>,
    prompt: Arc<dyn InitPrompt>,
    binder: RemoteBinder,
    guard: IndexRecoveryGuard,
    namer: SnapshotNamer,
    allocator: VersionAllocator,
    default_branch: String,
    batch_size: usize,
    create_missing_destination: bool,
}

impl SnapshotCommitter {
    /// Creates a committer from the engine configuration.
    pub fn new(
        config: &EngineConfig,
        vcs: Arc<dyn Vcs>,
        hosting: Arc<dyn HostingApi>,
        prompt: Arc<dyn InitPrompt>,
    ) -> Self {
        let guard = IndexRecoveryGuard::new(Arc::clone(&vcs))
            .with_patterns(config.excluded_paths())
            .with_orphan_gitlinks(config.exclude_orphan_gitlinks());

        Self {
            binder: RemoteBinder::new(Arc::clone(&vcs), config.remote_alias()),
            guard,
            vcs,
            hosting,
            prompt,
            namer: SnapshotNamer::new(),
            allocator: VersionAllocator::new(),
            default_branch: config.default_branch().to_string(),
            batch_size: config.stage_batch_size(),
            create_missing_destination: config.create_missing_destination(),
        }
    }

    /// Replaces the index guard, e.g. to add a custom exclusion predicate.
    pub fn with_guard(mut self, guard: IndexRecoveryGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Takes a snapshot of `workspace` and pushes it to `destination`.
    ///
    /// `note` is appended to the commit message; scheduled snapshots pass
    /// `None`.
    pub async fn snapshot(
        &self,
        workspace: Option<&Path>,
        destination: Option<&BackupDestination>,
        note: Option<&str>,
    ) -> Result<SnapshotResult> {
        let workdir = workspace
            .filter(|p| p.is_dir())
            .ok_or_else(|| SnapshotError::configuration("no workspace"))?;

        self.ensure_repository(workdir).await?;

        let destination = destination
            .ok_or_else(|| SnapshotError::configuration("no destination URL configured"))?;

        ensure_authenticated(self.hosting.as_ref()).await?;
        self.ensure_destination_exists(destination).await?;

        self.binder
            .bind(workdir, destination.url().as_str(), RemoteDirection::Push)
            .await?;

        let mut warnings = Vec::new();
        let version = self.allocate_version(destination, &mut warnings).await;
        let timestamp = SnapshotTimestamp::now();

        let name = self.create_branch(workdir, version, timestamp).await?;

        let excised = self.guard.run(workdir).await;
        if !excised.is_empty() {
            warnings.push(format!("untracked {} invalid index entries", excised.len()));
        }

        let staged = self.stage_changes(workdir, &excised).await?;

        let message = self.namer.commit_message(version, timestamp, note);
        self.vcs
            .commit(workdir, &message, true)
            .await
            .phase(Phase::Committing)?;

        let branch = name.branch();
        self.vcs
            .push(workdir, destination.remote_alias(), &branch, true)
            .await
            .phase(Phase::Pushing)?;

        self.vcs
            .fetch(workdir, destination.remote_alias(), None)
            .await
            .phase(Phase::Fetching)?;

        info!(
            branch = %branch,
            version = %version,
            staged,
            "Snapshot pushed"
        );

        let mut result = SnapshotResult::new(&name, staged);
        result.warnings = warnings;
        Ok(result)
    }

    /// Creates a repository if the workspace has none and the caller agrees.
    async fn ensure_repository(&self, workdir: &Path) -> Result<()> {
        if self
            .vcs
            .is_repository(workdir)
            .await
            .phase(Phase::Initializing)?
        {
            return Ok(());
        }

        if !self.prompt.confirm_init(workdir).await {
            return Err(SnapshotError::cancelled(
                "repository initialization declined",
            ));
        }

        info!(workspace = %workdir.display(), "Initializing repository");
        self.vcs.init(workdir).await.phase(Phase::Initializing)
    }

    /// Checks the destination repository is reachable, creating it if allowed.
    async fn ensure_destination_exists(&self, destination: &BackupDestination) -> Result<()> {
        let url = destination.url();
        match self.hosting.repository_exists(url).await {
            Ok(true) => Ok(()),
            Ok(false) if self.create_missing_destination => {
                let login = self
                    .hosting
                    .authenticated_user()
                    .await
                    .map_err(|e| e.into_snapshot_error(Phase::Provisioning))?;
                if !login.eq_ignore_ascii_case(url.owner()) {
                    return Err(SnapshotError::configuration(format!(
                        "destination {url} does not exist and is not owned by {login}"
                    )));
                }
                let created = self
                    .hosting
                    .create_private_repository(url.repo())
                    .await
                    .map_err(|e| e.into_snapshot_error(Phase::Provisioning))?;
                info!(url = %created, "Provisioned missing destination repository");
                Ok(())
            },
            Ok(false) => Err(SnapshotError::configuration(format!(
                "destination repository {url} does not exist or is not accessible"
            ))),
            Err(HostingError::Unauthorized(msg)) => Err(SnapshotError::authentication(msg)),
            Err(e) => {
                warn!(url = %url, error = %e, "Could not verify destination, continuing");
                Ok(())
            },
        }
    }

    /// Picks the next version from the destination's branches. Enumeration
    /// failure falls back to the initial version with a warning.
    async fn allocate_version(
        &self,
        destination: &BackupDestination,
        warnings: &mut Vec<String>,
    ) -> SnapshotVersion {
        match self
            .hosting
            .list_branches(destination.url(), SNAPSHOT_PREFIX)
            .await
        {
            Ok(branches) => {
                let version = self.allocator.next(&branches);
                debug!(existing = branches.len(), version = %version, "Allocated version");
                version
            },
            Err(e) => {
                warn!(error = %e, "Branch enumeration failed, falling back to version 1.0");
                warnings.push(format!("branch enumeration failed: {e}"));
                SnapshotVersion::INITIAL
            },
        }
    }

    /// Creates and switches to the snapshot branch, retrying once with a
    /// random suffix if the name is taken.
    async fn create_branch(
        &self,
        workdir: &Path,
        version: SnapshotVersion,
        timestamp: SnapshotTimestamp,
    ) -> Result<SnapshotName> {
        let state = self.vcs.status(workdir).await.phase(Phase::Branching)?;
        if state.head == HeadState::Unborn {
            debug!(branch = %self.default_branch, "Empty repository, creating default branch");
            match self
                .vcs
                .checkout(workdir, CheckoutTarget::Create(&self.default_branch))
                .await
            {
                Ok(()) => {},
                Err(e) if e.kind() == VcsErrorKind::AlreadyExists => {},
                Err(e) => return Err(e.into_snapshot_error(Phase::Branching)),
            }
        }

        let name = self.namer.name(version, timestamp);
        match self
            .vcs
            .checkout(workdir, CheckoutTarget::Create(&name.branch()))
            .await
        {
            Ok(()) => Ok(name),
            Err(e) if e.kind() == VcsErrorKind::AlreadyExists => {
                let retry = self.namer.disambiguate(&name);
                warn!(taken = %name, retry = %retry, "Snapshot branch name in use, retrying");
                self.vcs
                    .checkout(workdir, CheckoutTarget::Create(&retry.branch()))
                    .await
                    .phase(Phase::Branching)?;
                Ok(retry)
            },
            Err(e) => Err(e.into_snapshot_error(Phase::Branching)),
        }
    }

    /// Stages every changed path the guard allows, in bounded batches.
    /// Returns how many were staged.
    async fn stage_changes(&self, workdir: &Path, excised: &[String]) -> Result<usize> {
        let state = self.vcs.status(workdir).await.phase(Phase::Staging)?;
        let paths = self
            .guard
            .stageable(workdir, state.changed_paths, excised)
            .await;

        for batch in paths.chunks(self.batch_size) {
            self.vcs.add(workdir, batch).await.phase(Phase::Staging)?;
        }

        debug!(paths = paths.len(), batch_size = self.batch_size, "Staged changes");
        Ok(paths.len())
    }
}

impl std::fmt::Debug for SnapshotCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCommitter")
            .field("binder", &self.binder)
            .field("guard", &self.guard)
            .field("default_branch", &self.default_branch)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
