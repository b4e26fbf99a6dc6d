//! Restore state machine.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use snapkeep_core::{
    Phase, RestoreResult, Result, SnapshotError, SnapshotName, SnapshotTimestamp,
    validate_branch_name,
};
use tracing::{debug, info, warn};

use crate::destination::{BackupDestination, RemoteBinder};
use crate::error::{HostingError, VcsErrorKind, VcsResultExt};
use crate::hosting::{HostingApi, ensure_authenticated};
use crate::snapshot::SNAPSHOT_PREFIX;
use crate::vcs::{CheckoutTarget, RemoteDirection, Vcs};

/// Prefix of the stash label created when a restore shelves local changes.
pub const SHELF_LABEL_PREFIX: &str = "snapkeep-restore-";

/// Progress of a single restore call.
///
/// `Shelved` and `Reconciled` are only entered when the tree was dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Idle,
    RemoteBound,
    Fetched,
    Shelved,
    CheckedOut,
    Reconciled,
    Done,
}

impl fmt::Display for RestoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::RemoteBound => "remote-bound",
            Self::Fetched => "fetched",
            Self::Shelved => "shelved",
            Self::CheckedOut => "checked-out",
            Self::Reconciled => "reconciled",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Tracks the current state of one restore and logs each transition.
struct Progress<'a> {
    branch: &'a str,
    state: RestoreState,
}

impl<'a> Progress<'a> {
    fn new(branch: &'a str) -> Self {
        Self {
            branch,
            state: RestoreState::Idle,
        }
    }

    fn advance(&mut self, next: RestoreState) {
        debug!(branch = %self.branch, from = %self.state, to = %next, "Restore state change");
        self.state = next;
    }
}

/// Moves the working tree to a snapshot branch.
///
/// The checkout is forced and overwrites tracked files. Local changes are
/// shelved first and reapplied afterward; a failed reapply does not fail the
/// restore but is reported with the shelf label.
pub struct RestoreCoordinator {
    vcs: Arc<dyn Vcs>,
    hosting: Arc<dyn HostingApi>,
    binder: RemoteBinder,
}

impl RestoreCoordinator {
    /// Creates a coordinator that binds `alias` before fetching.
    pub fn new(vcs: Arc<dyn Vcs>, hosting: Arc<dyn HostingApi>, alias: impl Into<String>) -> Self {
        Self {
            binder: RemoteBinder::new(Arc::clone(&vcs), alias),
            vcs,
            hosting,
        }
    }

    /// Restores `branch` from `destination` into `workspace`.
    pub async fn restore(
        &self,
        workspace: Option<&Path>,
        destination: Option<&BackupDestination>,
        branch: &str,
    ) -> Result<RestoreResult> {
        let workdir = workspace
            .filter(|p| p.is_dir())
            .ok_or_else(|| SnapshotError::configuration("no workspace"))?;
        let destination = destination
            .ok_or_else(|| SnapshotError::configuration("no destination URL configured"))?;
        if validate_branch_name(branch).is_err() {
            return Err(SnapshotError::not_found(format!("snapshot '{branch}'")));
        }
        if !self
            .vcs
            .is_repository(workdir)
            .await
            .phase(Phase::Initializing)?
        {
            return Err(SnapshotError::configuration(format!(
                "{} is not a repository",
                workdir.display()
            )));
        }

        let mut progress = Progress::new(branch);

        self.binder
            .bind(workdir, destination.url().as_str(), RemoteDirection::Fetch)
            .await?;
        progress.advance(RestoreState::RemoteBound);

        match self
            .vcs
            .fetch(workdir, destination.remote_alias(), Some(branch))
            .await
        {
            Ok(()) => {},
            Err(e) if e.kind() == VcsErrorKind::NotFound => {
                return Err(SnapshotError::not_found(format!(
                    "snapshot '{branch}' at {}",
                    destination.url()
                )));
            },
            Err(e) => return Err(e.into_snapshot_error(Phase::Fetching)),
        }
        progress.advance(RestoreState::Fetched);

        let state = self.vcs.status(workdir).await.phase(Phase::Shelving)?;
        let shelf = if state.is_dirty() {
            let label = format!("{SHELF_LABEL_PREFIX}{}", SnapshotTimestamp::now());
            self.vcs
                .stash_push(workdir, &label)
                .await
                .phase(Phase::Shelving)?;
            info!(label = %label, paths = state.changed_paths.len(), "Shelved local changes");
            progress.advance(RestoreState::Shelved);
            Some(label)
        } else {
            None
        };

        let tracking = destination.tracking_ref(branch);
        let checkout = self
            .vcs
            .checkout(
                workdir,
                CheckoutTarget::Force {
                    branch,
                    start_point: &tracking,
                },
            )
            .await
            .phase(Phase::CheckingOut);
        if let Err(e) = checkout {
            return Err(match &shelf {
                Some(label) => e.with_shelf(label.as_str()),
                None => e,
            });
        }
        progress.advance(RestoreState::CheckedOut);

        let result = match shelf {
            None => RestoreResult::clean(branch),
            Some(label) => match self.vcs.stash_pop(workdir, &label).await {
                Ok(()) => {
                    progress.advance(RestoreState::Reconciled);
                    RestoreResult::reapplied(branch, label)
                },
                Err(e) => {
                    warn!(
                        branch = %branch,
                        label = %label,
                        error = %e,
                        "Could not reapply shelved changes, resolve manually"
                    );
                    RestoreResult::conflicted(branch, label)
                },
            },
        };
        progress.advance(RestoreState::Done);

        info!(branch = %branch, reconciled = result.reconciled, "Restore complete");
        Ok(result)
    }

    /// Restores the snapshot with the most recent timestamp.
    pub async fn restore_latest(
        &self,
        workspace: Option<&Path>,
        destination: Option<&BackupDestination>,
    ) -> Result<RestoreResult> {
        let dest = destination
            .ok_or_else(|| SnapshotError::configuration("no destination URL configured"))?;
        let names = self.snapshots(dest).await?;
        let latest = latest_snapshot(&names)
            .ok_or_else(|| SnapshotError::not_found(format!("no snapshots at {}", dest.url())))?;

        debug!(branch = %latest, "Selected latest snapshot");
        self.restore(workspace, destination, &latest.branch()).await
    }

    /// Lists the snapshot branches at `destination`, skipping anything that
    /// does not parse as a snapshot name.
    pub async fn snapshots(&self, destination: &BackupDestination) -> Result<Vec<SnapshotName>> {
        ensure_authenticated(self.hosting.as_ref()).await?;
        let branches = self
            .hosting
            .list_branches(destination.url(), SNAPSHOT_PREFIX)
            .await
            .map_err(|e| match e {
                HostingError::NotFound(_) => SnapshotError::configuration(format!(
                    "destination repository {} does not exist or is not accessible",
                    destination.url()
                )),
                other => other.into_snapshot_error(Phase::Listing),
            })?;
        Ok(branches
            .iter()
            .filter_map(|b| SnapshotName::parse(b))
            .collect())
    }
}

impl fmt::Debug for RestoreCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreCoordinator")
            .field("binder", &self.binder)
            .finish()
    }
}

/// Picks the newest snapshot by timestamp, breaking ties by version.
pub fn latest_snapshot(names: &[SnapshotName]) -> Option<&SnapshotName> {
    names
        .iter()
        .max_by_key(|n| (n.timestamp(), n.version()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<SnapshotName> {
        raw.iter().filter_map(|b| SnapshotName::parse(b)).collect()
    }

    #[test]
    fn test_latest_by_timestamp() {
        let list = names(&[
            "v1.0/2024-01-01_00-00-00",
            "v1.1/2024-03-05_00-00-00",
            "v1.2/2024-02-10_00-00-00",
        ]);
        let latest = latest_snapshot(&list).unwrap();
        assert_eq!(latest.branch(), "v1.1/2024-03-05_00-00-00");
    }

    #[test]
    fn test_latest_tie_prefers_higher_version() {
        let list = names(&["v1.0/2024-01-01_00-00-00", "v1.1/2024-01-01_00-00-00"]);
        assert_eq!(latest_snapshot(&list).unwrap().branch(), "v1.1/2024-01-01_00-00-00");
    }

    #[test]
    fn test_latest_empty() {
        assert!(latest_snapshot(&[]).is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RestoreState::CheckedOut.to_string(), "checked-out");
    }
}
