//! Caller-facing facade over the engine and its scheduler.

use std::sync::Arc;

use snapkeep_core::{RestoreResult, Result, SnapshotName, SnapshotResult};

use crate::config::EngineConfig;
use crate::destination::{BackupDestination, RepoUrl};
use crate::engine::SnapshotEngine;
use crate::hosting::HostingApi;
use crate::snapshot::InitPrompt;
use crate::sync::{BackupScheduler, ScheduleStatus};
use crate::vcs::Vcs;

/// Snapshot and restore operations plus the schedule that drives them.
///
/// The scheduler is created stopped; call [`start`](Self::start) to enable it.
/// Dropping the service stops the timer.
pub struct BackupService {
    engine: Arc<SnapshotEngine>,
    scheduler: BackupScheduler,
}

impl BackupService {
    /// Wraps an existing engine.
    pub fn new(engine: SnapshotEngine, interval_minutes: i64) -> Self {
        let engine = Arc::new(engine);
        Self {
            scheduler: BackupScheduler::new(Arc::clone(&engine), interval_minutes),
            engine,
        }
    }

    /// Builds a service over the given VCS and hosting handles.
    pub fn from_config(
        config: &EngineConfig,
        vcs: Arc<dyn Vcs>,
        hosting: Arc<dyn HostingApi>,
        prompt: Arc<dyn InitPrompt>,
    ) -> Result<Self> {
        let engine = SnapshotEngine::new(config, vcs, hosting, prompt)?;
        Ok(Self::new(engine, config.interval_minutes()))
    }

    /// Builds a service that drives the system `git` binary.
    pub fn with_git(
        config: &EngineConfig,
        hosting: Arc<dyn HostingApi>,
        prompt: Arc<dyn InitPrompt>,
    ) -> Result<Self> {
        let engine = SnapshotEngine::with_git(config, hosting, prompt)?;
        Ok(Self::new(engine, config.interval_minutes()))
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<SnapshotEngine> {
        &self.engine
    }

    /// Takes a snapshot now.
    pub async fn trigger_snapshot(&self, note: Option<&str>) -> Result<SnapshotResult> {
        self.engine.trigger_snapshot(note).await
    }

    /// Restores a named snapshot.
    pub async fn restore(&self, branch: &str) -> Result<RestoreResult> {
        self.engine.restore(branch).await
    }

    /// Restores the newest snapshot.
    pub async fn restore_latest(&self) -> Result<RestoreResult> {
        self.engine.restore_latest().await
    }

    /// Lists snapshots at the destination, newest first.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotName>> {
        self.engine.list_snapshots().await
    }

    /// Creates a private repository and makes it the destination.
    pub async fn provision_destination(&self, name: &str) -> Result<RepoUrl> {
        self.engine.provision_destination(name).await
    }

    /// Changes the destination repository.
    pub fn set_destination(&self, url: &str) -> Result<()> {
        self.engine.set_destination(url)
    }

    /// Returns the active destination.
    pub fn destination(&self) -> Option<BackupDestination> {
        self.engine.destination()
    }

    /// Changes the schedule interval. Zero or negative disables scheduling.
    pub fn set_interval(&self, minutes: i64) {
        self.scheduler.set_interval(minutes);
    }

    /// Starts scheduled snapshots.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stops scheduled snapshots.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Returns the schedule and last-snapshot state.
    pub fn status(&self) -> ScheduleStatus {
        self.engine
            .state()
            .status(self.scheduler.is_running(), self.scheduler.interval_minutes())
    }
}

impl Drop for BackupService {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

impl std::fmt::Debug for BackupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupService")
            .field("engine", &self.engine)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
