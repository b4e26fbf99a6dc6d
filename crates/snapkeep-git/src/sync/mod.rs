//! Scheduled snapshots.
//!
//! A single repeating timer drives [`SnapshotEngine::scheduled_snapshot`];
//! outcomes are recorded in a shared [`ScheduleState`].
//!
//! [`SnapshotEngine::scheduled_snapshot`]: crate::SnapshotEngine::scheduled_snapshot

mod scheduler;
mod state;

pub use scheduler::{BackupScheduler, ScheduleHandle};
pub use state::{ScheduleState, ScheduleStatus};
