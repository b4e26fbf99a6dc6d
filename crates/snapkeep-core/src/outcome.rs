//! Results returned to callers of snapshot and restore operations.

use serde::{Deserialize, Serialize};

use crate::naming::SnapshotName;
use crate::version::SnapshotVersion;

/// Outcome of a successful snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResult {
    /// The branch that was pushed.
    pub branch_name: String,
    /// The version assigned to the snapshot.
    pub version: SnapshotVersion,
    /// Number of paths staged into the snapshot commit. Zero means the
    /// snapshot is an empty commit.
    pub staged_paths: usize,
    /// Degraded steps that did not stop the snapshot, such as a failed branch
    /// enumeration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SnapshotResult {
    /// Creates a result for the given snapshot name.
    pub fn new(name: &SnapshotName, staged_paths: usize) -> Self {
        Self {
            branch_name: name.branch(),
            version: name.version(),
            staged_paths,
            warnings: Vec::new(),
        }
    }

    /// Returns true if the snapshot recorded no changes.
    pub fn is_empty(&self) -> bool {
        self.staged_paths == 0
    }
}

/// Outcome of a successful restore.
///
/// A restore succeeds once the forced checkout completes. If local changes
/// were shelved and could not be reapplied cleanly, `reconciled` is false and
/// `conflict_label` names the stash that still holds them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    /// The snapshot branch now checked out.
    pub branch_name: String,
    /// False only when shelved changes failed to reapply.
    pub reconciled: bool,
    /// Label of the stash left behind after a failed reapply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_label: Option<String>,
    /// Label of the stash created for this restore, if the tree was dirty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelf_label: Option<String>,
}

impl RestoreResult {
    /// A restore of a clean tree; nothing was shelved.
    pub fn clean(branch_name: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            reconciled: true,
            conflict_label: None,
            shelf_label: None,
        }
    }

    /// A restore whose shelved changes were reapplied.
    pub fn reapplied(branch_name: impl Into<String>, shelf: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            reconciled: true,
            conflict_label: None,
            shelf_label: Some(shelf.into()),
        }
    }

    /// A restore whose shelved changes conflicted on reapply.
    pub fn conflicted(branch_name: impl Into<String>, shelf: impl Into<String>) -> Self {
        let shelf = shelf.into();
        Self {
            branch_name: branch_name.into(),
            reconciled: false,
            conflict_label: Some(shelf.clone()),
            shelf_label: Some(shelf),
        }
    }

    /// Returns true if a stash was created during the restore.
    pub fn shelved(&self) -> bool {
        self.shelf_label.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SnapshotTimestamp;

    #[test]
    fn test_snapshot_result() {
        let name = SnapshotName::new(SnapshotVersion::new(1, 1), SnapshotTimestamp::now());
        let result = SnapshotResult::new(&name, 0);
        assert!(result.is_empty());
        assert_eq!(result.branch_name, name.branch());
        assert_eq!(result.version, SnapshotVersion::new(1, 1));
    }

    #[test]
    fn test_restore_constructors() {
        let clean = RestoreResult::clean("v1.0/2024-01-01_00-00-00");
        assert!(clean.reconciled);
        assert!(!clean.shelved());

        let ok = RestoreResult::reapplied("b", "shelf");
        assert!(ok.reconciled);
        assert!(ok.conflict_label.is_none());
        assert!(ok.shelved());

        let conflict = RestoreResult::conflicted("b", "shelf");
        assert!(!conflict.reconciled);
        assert_eq!(conflict.conflict_label.as_deref(), Some("shelf"));
    }

    #[test]
    fn test_restore_result_serialization() {
        let json = serde_json::to_value(RestoreResult::conflicted("b", "s")).unwrap();
        assert_eq!(json["reconciled"], false);
        assert_eq!(json["conflictLabel"], "s");

        let json = serde_json::to_value(RestoreResult::clean("b")).unwrap();
        assert!(json.get("conflictLabel").is_none());
    }
}
