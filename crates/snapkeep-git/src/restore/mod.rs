//! Restoring the working tree from a snapshot branch.

mod coordinator;

pub use coordinator::{RestoreCoordinator, RestoreState, SHELF_LABEL_PREFIX, latest_snapshot};
