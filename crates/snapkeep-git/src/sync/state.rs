//! Snapshot schedule state tracking.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Point-in-time copy of [`ScheduleState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatus {
    /// Whether the timer is running.
    pub running: bool,
    /// Minutes between scheduled snapshots, zero when disabled.
    pub interval_minutes: i64,
    /// Branch pushed by the last successful snapshot.
    pub last_branch: Option<String>,
    /// When the last successful snapshot finished.
    pub last_snapshot_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure since the last success.
    pub last_error: Option<String>,
    /// Consecutive failed snapshots.
    pub failure_count: u32,
    /// Scheduled ticks skipped because another operation held the workspace.
    pub skipped_ticks: u64,
}

/// Tracks the outcome of snapshots, manual and scheduled.
#[derive(Debug)]
pub struct ScheduleState {
    last_branch: RwLock<Option<String>>,
    last_snapshot_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    failure_count: RwLock<u32>,
    skipped_ticks: RwLock<u64>,
}

impl ScheduleState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self {
            last_branch: RwLock::new(None),
            last_snapshot_at: RwLock::new(None),
            last_error: RwLock::new(None),
            failure_count: RwLock::new(0),
            skipped_ticks: RwLock::new(0),
        }
    }

    /// Returns the branch pushed by the last successful snapshot.
    pub fn last_branch(&self) -> Option<String> {
        self.last_branch.read().clone()
    }

    /// Returns when the last successful snapshot finished.
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot_at.read()
    }

    /// Records a successful snapshot.
    pub fn record_success(&self, branch: impl Into<String>) {
        let mut last_branch = self.last_branch.write();
        let mut last_snapshot_at = self.last_snapshot_at.write();
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *last_branch = Some(branch.into());
        *last_snapshot_at = Some(Utc::now());
        *last_error = None;
        *failure_count = 0;
    }

    /// Records a failed snapshot.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut last_error = self.last_error.write();
        let mut failure_count = self.failure_count.write();

        *last_error = Some(error.into());
        *failure_count += 1;
    }

    /// Records a scheduled tick that found an operation in flight.
    pub fn record_skip(&self) {
        *self.skipped_ticks.write() += 1;
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        *self.failure_count.read()
    }

    /// Returns the number of skipped ticks.
    pub fn skipped_ticks(&self) -> u64 {
        *self.skipped_ticks.read()
    }

    /// Returns true if the most recent snapshot succeeded.
    pub fn is_healthy(&self) -> bool {
        self.last_error.read().is_none()
    }

    /// Copies the state into a [`ScheduleStatus`].
    pub fn status(&self, running: bool, interval_minutes: i64) -> ScheduleStatus {
        ScheduleStatus {
            running,
            interval_minutes,
            last_branch: self.last_branch(),
            last_snapshot_at: self.last_snapshot_at(),
            last_error: self.last_error(),
            failure_count: self.failure_count(),
            skipped_ticks: self.skipped_ticks(),
        }
    }
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = ScheduleState::new();
        assert!(state.last_branch().is_none());
        assert!(state.last_snapshot_at().is_none());
        assert!(state.is_healthy());
        assert_eq!(state.skipped_ticks(), 0);
    }

    #[test]
    fn test_record_success() {
        let state = ScheduleState::new();
        state.record_success("v1.0/2024-01-01_00-00-00");

        assert_eq!(state.last_branch().as_deref(), Some("v1.0/2024-01-01_00-00-00"));
        assert!(state.last_snapshot_at().is_some());
        assert_eq!(state.failure_count(), 0);
    }

    #[test]
    fn test_success_resets_failure() {
        let state = ScheduleState::new();
        state.record_failure("push rejected");
        state.record_failure("timeout");
        assert_eq!(state.failure_count(), 2);
        assert_eq!(state.last_error().as_deref(), Some("timeout"));
        assert!(!state.is_healthy());

        state.record_success("v1.1/2024-01-01_00-10-00");
        assert_eq!(state.failure_count(), 0);
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_status_copy() {
        let state = ScheduleState::new();
        state.record_skip();
        state.record_skip();

        let status = state.status(true, 15);
        assert!(status.running);
        assert_eq!(status.interval_minutes, 15);
        assert_eq!(status.skipped_ticks, 2);
    }
}
