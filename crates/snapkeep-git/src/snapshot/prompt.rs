//! Confirmation asked before creating a repository in an unversioned workspace.

use std::path::Path;

use async_trait::async_trait;

/// Asks whether a repository may be created in `workspace`.
#[async_trait]
pub trait InitPrompt: Send + Sync {
    /// Returns true to initialize, false to cancel the snapshot.
    async fn confirm_init(&self, workspace: &Path) -> bool;
}

/// Answers every prompt with a fixed value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl InitPrompt for AutoConfirm {
    async fn confirm_init(&self, _workspace: &Path) -> bool {
        self.0
    }
}
