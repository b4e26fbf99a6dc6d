//! The snapshot engine: one workspace, one destination, one operation at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use snapkeep_core::{Phase, RestoreResult, Result, SnapshotError, SnapshotName, SnapshotResult};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::destination::{BackupDestination, RepoUrl};
use crate::hosting::{HostingApi, ensure_authenticated};
use crate::restore::RestoreCoordinator;
use crate::snapshot::{InitPrompt, SnapshotCommitter};
use crate::sync::ScheduleState;
use crate::vcs::{GitCli, Vcs};

/// Runs snapshots and restores against the configured workspace and
/// destination.
///
/// Every operation holds a single-flight guard for its whole duration, so two
/// operations never touch the working tree at once. Manual calls wait for the
/// guard; scheduled snapshots skip their tick instead.
pub struct SnapshotEngine {
    workspace: Option<PathBuf>,
    remote_alias: String,
    destination: RwLock<Option<BackupDestination>>,
    committer: SnapshotCommitter,
    restorer: RestoreCoordinator,
    hosting: Arc<dyn HostingApi>,
    in_flight: Mutex<()>,
    state: Arc<ScheduleState>,
}

impl SnapshotEngine {
    /// Creates an engine over the given VCS and hosting handles.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured destination is not a
    /// valid repository URL.
    pub fn new(
        config: &EngineConfig,
        vcs: Arc<dyn Vcs>,
        hosting: Arc<dyn HostingApi>,
        prompt: Arc<dyn InitPrompt>,
    ) -> Result<Self> {
        let destination = config
            .destination()
            .map(|url| RepoUrl::parse(url).map(|u| BackupDestination::new(u, config.remote_alias())))
            .transpose()?;

        Ok(Self {
            workspace: config.workspace().cloned(),
            remote_alias: config.remote_alias().to_string(),
            destination: RwLock::new(destination),
            committer: SnapshotCommitter::new(
                config,
                Arc::clone(&vcs),
                Arc::clone(&hosting),
                prompt,
            ),
            restorer: RestoreCoordinator::new(vcs, Arc::clone(&hosting), config.remote_alias()),
            hosting,
            in_flight: Mutex::new(()),
            state: Arc::new(ScheduleState::new()),
        })
    }

    /// Creates an engine that drives the system `git` binary.
    pub fn with_git(
        config: &EngineConfig,
        hosting: Arc<dyn HostingApi>,
        prompt: Arc<dyn InitPrompt>,
    ) -> Result<Self> {
        let mut git = GitCli::new(config.command_timeout(), config.network_timeout());
        if let Some((name, email)) = config.committer() {
            git = git.with_identity(name, email);
        }
        Self::new(config, Arc::new(git), hosting, prompt)
    }

    /// Replaces the committer, e.g. to install a custom index guard.
    pub fn with_committer(mut self, committer: SnapshotCommitter) -> Self {
        self.committer = committer;
        self
    }

    /// Returns the workspace root.
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    /// Returns the active destination.
    pub fn destination(&self) -> Option<BackupDestination> {
        self.destination.read().clone()
    }

    /// Points future operations at a different destination repository.
    ///
    /// The reserved remote is rebound lazily by the next snapshot or restore.
    pub fn set_destination(&self, url: &str) -> Result<()> {
        let parsed = RepoUrl::parse(url)?;
        info!(url = %parsed, "Destination set");
        *self.destination.write() = Some(BackupDestination::new(parsed, self.remote_alias.clone()));
        Ok(())
    }

    /// Returns the shared snapshot state.
    pub fn state(&self) -> Arc<ScheduleState> {
        Arc::clone(&self.state)
    }

    /// Takes a snapshot now, waiting for any running operation to finish.
    pub async fn trigger_snapshot(&self, note: Option<&str>) -> Result<SnapshotResult> {
        let _guard = self.in_flight.lock().await;
        info!("Manual snapshot triggered");
        self.run_snapshot(note).await
    }

    /// Takes a scheduled snapshot, or skips it if an operation is running.
    ///
    /// Returns `None` for a skipped tick.
    pub async fn scheduled_snapshot(&self) -> Option<Result<SnapshotResult>> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("Previous operation still running, skipping scheduled snapshot");
            self.state.record_skip();
            return None;
        };
        Some(self.run_snapshot(None).await)
    }

    async fn run_snapshot(&self, note: Option<&str>) -> Result<SnapshotResult> {
        let destination = self.destination();
        let result = self
            .committer
            .snapshot(self.workspace(), destination.as_ref(), note)
            .await;

        match &result {
            Ok(r) => self.state.record_success(&r.branch_name),
            Err(e) => {
                warn!(error = %e, "Snapshot failed");
                self.state.record_failure(e.to_string());
            },
        }
        result
    }

    /// Restores the working tree to `branch`.
    pub async fn restore(&self, branch: &str) -> Result<RestoreResult> {
        let _guard = self.in_flight.lock().await;
        let destination = self.destination();
        self.restorer
            .restore(self.workspace(), destination.as_ref(), branch)
            .await
    }

    /// Restores the working tree to the newest snapshot.
    pub async fn restore_latest(&self) -> Result<RestoreResult> {
        let _guard = self.in_flight.lock().await;
        let destination = self.destination();
        self.restorer
            .restore_latest(self.workspace(), destination.as_ref())
            .await
    }

    /// Lists the destination's snapshots, newest first.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotName>> {
        let destination = self
            .destination()
            .ok_or_else(|| SnapshotError::configuration("no destination URL configured"))?;
        let mut names = self.restorer.snapshots(&destination).await?;
        names.sort_by(|a, b| {
            (b.timestamp(), b.version()).cmp(&(a.timestamp(), a.version()))
        });
        Ok(names)
    }

    /// Creates a private repository named `name` and makes it the destination.
    pub async fn provision_destination(&self, name: &str) -> Result<RepoUrl> {
        if name.trim().is_empty() {
            return Err(SnapshotError::configuration("repository name cannot be empty"));
        }
        ensure_authenticated(self.hosting.as_ref()).await?;
        let url = self
            .hosting
            .create_private_repository(name)
            .await
            .map_err(|e| e.into_snapshot_error(Phase::Provisioning))?;
        *self.destination.write() =
            Some(BackupDestination::new(url.clone(), self.remote_alias.clone()));
        info!(url = %url, "Provisioned destination");
        Ok(url)
    }
}

impl std::fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("workspace", &self.workspace)
            .field("destination", &*self.destination.read())
            .field("committer", &self.committer)
            .finish()
    }
}
