//! The snapshot path: index hygiene, staging, commit and push.

mod committer;
mod guard;
mod prompt;

pub use committer::SnapshotCommitter;
pub use guard::{ExclusionPredicate, IndexRecoveryGuard};
pub use prompt::{AutoConfirm, InitPrompt};
pub(crate) use committer::SNAPSHOT_PREFIX;
