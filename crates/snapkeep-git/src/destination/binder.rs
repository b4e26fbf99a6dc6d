//! Keeps the reserved remote pointed at the configured destination.

use std::path::Path;
use std::sync::Arc;

use snapkeep_core::{Phase, Result};
use tracing::{debug, info};

use crate::error::{VcsErrorKind, VcsResultExt};
use crate::vcs::{RemoteDirection, Vcs};

/// What a bind call had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The remote already pointed at the URL.
    Unchanged,
    /// The remote did not exist and was added.
    Added,
    /// The remote pointed elsewhere and was replaced.
    Rebound { previous: String },
}

/// Ensures exactly one remote under the reserved alias exists and points at
/// the destination URL.
///
/// A remote pointing elsewhere is removed and added again rather than edited
/// in place. Binding the same URL twice is a no-op the second time.
pub struct RemoteBinder {
    vcs: Arc<dyn Vcs>,
    alias: String,
}

impl RemoteBinder {
    /// Creates a binder for `alias`.
    pub fn new(vcs: Arc<dyn Vcs>, alias: impl Into<String>) -> Self {
        Self {
            vcs,
            alias: alias.into(),
        }
    }

    /// Returns the reserved alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Binds the alias to `url`, comparing against the URL for `direction`.
    ///
    /// Snapshots check the push URL; restores check the fetch URL.
    pub async fn bind(
        &self,
        workdir: &Path,
        url: &str,
        direction: RemoteDirection,
    ) -> Result<BindOutcome> {
        let current = self
            .vcs
            .remote_url(workdir, &self.alias, direction)
            .await
            .phase(Phase::Binding)?;

        match current {
            Some(existing) if existing == url => {
                debug!(alias = %self.alias, url = %url, "Remote already bound");
                Ok(BindOutcome::Unchanged)
            },
            Some(existing) => {
                info!(
                    alias = %self.alias,
                    from = %existing,
                    to = %url,
                    "Destination changed, rebinding remote"
                );
                self.replace(workdir, url).await?;
                Ok(BindOutcome::Rebound { previous: existing })
            },
            None => match self.vcs.add_remote(workdir, &self.alias, url).await {
                Ok(()) => {
                    info!(alias = %self.alias, url = %url, "Bound backup remote");
                    Ok(BindOutcome::Added)
                },
                // Present without a URL for this direction: start over.
                Err(e) if e.kind() == VcsErrorKind::AlreadyExists => {
                    self.replace(workdir, url).await?;
                    Ok(BindOutcome::Rebound {
                        previous: String::new(),
                    })
                },
                Err(e) => Err(e.into_snapshot_error(Phase::Binding)),
            },
        }
    }

    async fn replace(&self, workdir: &Path, url: &str) -> Result<()> {
        self.vcs
            .remove_remote(workdir, &self.alias)
            .await
            .phase(Phase::Binding)?;
        self.vcs
            .add_remote(workdir, &self.alias, url)
            .await
            .phase(Phase::Binding)
    }
}

impl std::fmt::Debug for RemoteBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBinder")
            .field("alias", &self.alias)
            .finish()
    }
}
