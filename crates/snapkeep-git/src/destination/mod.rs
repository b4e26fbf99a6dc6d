//! The backup destination: its URL and the reserved remote bound to it.

mod binder;
mod url;

pub use binder::{BindOutcome, RemoteBinder};
pub use url::{RepoUrl, UrlScheme};

/// Default name of the remote reserved for backups. Distinct from `origin` so
/// the user's own remotes are never touched.
pub const DEFAULT_REMOTE_ALIAS: &str = "snapkeep-backup";

/// The single remote that snapshots are pushed to and restored from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDestination {
    url: RepoUrl,
    remote_alias: String,
}

impl BackupDestination {
    /// Creates a destination bound under `remote_alias`.
    pub fn new(url: RepoUrl, remote_alias: impl Into<String>) -> Self {
        Self {
            url,
            remote_alias: remote_alias.into(),
        }
    }

    /// Returns the repository URL.
    pub fn url(&self) -> &RepoUrl {
        &self.url
    }

    /// Returns the reserved remote alias.
    pub fn remote_alias(&self) -> &str {
        &self.remote_alias
    }

    /// Returns the remote-tracking ref for a branch fetched from this destination.
    pub fn tracking_ref(&self, branch: &str) -> String {
        format!("refs/remotes/{}/{}", self.remote_alias, branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_ref() {
        let dest = BackupDestination::new(
            RepoUrl::parse("https://github.com/acme/backups.git").unwrap(),
            DEFAULT_REMOTE_ALIAS,
        );
        assert_eq!(
            dest.tracking_ref("v1.0/2024-01-01_00-00-00"),
            "refs/remotes/snapkeep-backup/v1.0/2024-01-01_00-00-00"
        );
    }
}
