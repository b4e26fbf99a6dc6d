//! Snapkeep Core - Domain types for versioned snapshots
//!
//! This crate holds the pieces of the snapshot engine that do no I/O:
//! version allocation, snapshot naming, the caller-facing outcome types and
//! the error taxonomy shared by every operation.

pub mod error;
pub mod naming;
pub mod outcome;
pub mod version;

pub use error::{Phase, Result, SnapshotError};
pub use naming::{
    SnapshotName, SnapshotNamer, SnapshotTimestamp, TIMESTAMP_FORMAT, validate_branch_name,
};
pub use outcome::{RestoreResult, SnapshotResult};
pub use version::{SnapshotVersion, VersionAllocator};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
