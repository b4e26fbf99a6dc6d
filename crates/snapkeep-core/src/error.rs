//! Error types for Snapkeep.
//!
//! Every operation exposed to callers returns [`Result<T>`], whose error side
//! is the single [`SnapshotError`] taxonomy. Lower layers (the VCS command
//! layer, the hosting API) have their own error types and are converted at the
//! engine boundary, keeping the original message intact.
//!
//! # Example
//!
//! ```
//! use snapkeep_core::{Phase, SnapshotError};
//!
//! let err = SnapshotError::git(Phase::Pushing, "remote rejected");
//! assert_eq!(err.to_string(), "git error while pushing: remote rejected");
//! assert!(err.is_retryable());
//! ```

use std::fmt;

use thiserror::Error;

/// Convenient result alias used across the workspace.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// The step of a snapshot or restore that was running when a git command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Creating a repository in an unversioned workspace.
    Initializing,
    /// Reading or rewriting the reserved remote.
    Binding,
    /// Creating the snapshot branch.
    Branching,
    /// Adding changed paths to the index.
    Staging,
    /// Recording the snapshot commit.
    Committing,
    /// Sending the snapshot branch to the destination.
    Pushing,
    /// Fetching from the destination.
    Fetching,
    /// Stashing local changes before a restore.
    Shelving,
    /// Forced checkout onto a snapshot.
    CheckingOut,
    /// Reapplying stashed changes after a restore.
    Reconciling,
    /// Enumerating snapshot branches.
    Listing,
    /// Creating a destination repository on the hosting service.
    Provisioning,
}

impl Phase {
    /// Returns the phase as a gerund, as used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Binding => "binding",
            Self::Branching => "branching",
            Self::Staging => "staging",
            Self::Committing => "committing",
            Self::Pushing => "pushing",
            Self::Fetching => "fetching",
            Self::Shelving => "shelving",
            Self::CheckingOut => "checking out",
            Self::Reconciling => "reconciling",
            Self::Listing => "listing",
            Self::Provisioning => "provisioning",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by snapshot and restore operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The engine is not configured well enough to run: no workspace, no
    /// destination URL, or a destination URL that cannot be parsed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No usable credential for the destination.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// An underlying VCS command failed.
    #[error(
        "git error while {phase}: {message}{}",
        shelf.as_deref().map(|s| format!(" (local changes shelved as '{s}')")).unwrap_or_default()
    )]
    Git {
        /// The step that was running.
        phase: Phase,
        /// The message reported by the VCS layer, unmodified.
        message: String,
        /// Label of a stash holding the caller's local changes, if one was
        /// created before the failure.
        shelf: Option<String>,
    },

    /// The requested snapshot branch does not exist at the destination.
    #[error("snapshot not found: {0}")]
    NotFound(String),

    /// The caller declined a required confirmation.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl SnapshotError {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Creates a git error for the given phase.
    pub fn git(phase: Phase, msg: impl Into<String>) -> Self {
        Self::Git {
            phase,
            message: msg.into(),
            shelf: None,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates a cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Attaches a stash label to a git error. Other variants are returned as is.
    pub fn with_shelf(self, label: impl Into<String>) -> Self {
        match self {
            Self::Git { phase, message, .. } => Self::Git {
                phase,
                message,
                shelf: Some(label.into()),
            },
            other => other,
        }
    }

    /// Returns the phase of a git error.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Git { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Returns the stash label carried by a git error.
    pub fn shelf(&self) -> Option<&str> {
        match self {
            Self::Git { shelf, .. } => shelf.as_deref(),
            _ => None,
        }
    }

    /// Returns true if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the same call might succeed when tried again later.
    ///
    /// Configuration and cancellation errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Git { .. } | Self::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SnapshotError::configuration("no workspace");
        assert_eq!(err.to_string(), "configuration error: no workspace");

        let err = SnapshotError::not_found("v1.0/2024-01-01_00-00-00");
        assert_eq!(
            err.to_string(),
            "snapshot not found: v1.0/2024-01-01_00-00-00"
        );

        let err = SnapshotError::git(Phase::CheckingOut, "pathspec did not match");
        assert_eq!(
            err.to_string(),
            "git error while checking out: pathspec did not match"
        );
    }

    #[test]
    fn test_shelf_in_display() {
        let err = SnapshotError::git(Phase::CheckingOut, "boom")
            .with_shelf("snapkeep-restore-2024-01-01_00-00-00");

        assert_eq!(err.shelf(), Some("snapkeep-restore-2024-01-01_00-00-00"));
        assert!(
            err.to_string()
                .contains("local changes shelved as 'snapkeep-restore-2024-01-01_00-00-00'")
        );
    }

    #[test]
    fn test_with_shelf_ignores_other_variants() {
        let err = SnapshotError::not_found("x").with_shelf("label");
        assert!(err.shelf().is_none());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_is_retryable() {
        assert!(SnapshotError::git(Phase::Fetching, "timeout").is_retryable());
        assert!(SnapshotError::authentication("expired").is_retryable());
        assert!(!SnapshotError::configuration("no destination").is_retryable());
        assert!(!SnapshotError::cancelled("declined").is_retryable());
        assert!(!SnapshotError::not_found("x").is_retryable());
    }

    #[test]
    fn test_phase() {
        assert_eq!(
            SnapshotError::git(Phase::Staging, "x").phase(),
            Some(Phase::Staging)
        );
        assert_eq!(SnapshotError::configuration("x").phase(), None);
    }
}
