//! Error types for the VCS command layer and the hosting API.
//!
//! Both convert into [`SnapshotError`] at the engine boundary. The VCS side
//! needs a [`Phase`] to do so, supplied through [`VcsResultExt::phase`].

use snapkeep_core::{Phase, SnapshotError};

/// Broad classification of a failed VCS command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsErrorKind {
    /// The branch, remote or stash being created already exists.
    AlreadyExists,
    /// The ref, remote or stash being read does not exist.
    NotFound,
    /// A merge or stash reapply stopped on conflicts.
    Conflict,
    /// The command did not finish in time.
    Timeout,
    /// The command could not be spawned.
    Io,
    /// Any other non-zero exit.
    Failed,
}

/// A failed VCS command.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct VcsError {
    kind: VcsErrorKind,
    message: String,
}

impl VcsError {
    /// Creates an error of the given kind.
    pub fn new(kind: VcsErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(VcsErrorKind::Failed, message)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> VcsErrorKind {
        self.kind
    }

    /// Returns the message reported by the command.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Converts into the caller-facing error for the given phase.
    pub fn into_snapshot_error(self, phase: Phase) -> SnapshotError {
        SnapshotError::git(phase, self.message)
    }
}

impl From<std::io::Error> for VcsError {
    fn from(err: std::io::Error) -> Self {
        Self::new(VcsErrorKind::Io, err.to_string())
    }
}

/// Attaches a phase to VCS results.
pub trait VcsResultExt<T> {
    /// Maps a [`VcsError`] into a [`SnapshotError::Git`] for `phase`.
    fn phase(self, phase: Phase) -> Result<T, SnapshotError>;
}

impl<T> VcsResultExt<T> for Result<T, VcsError> {
    fn phase(self, phase: Phase) -> Result<T, SnapshotError> {
        self.map_err(|e| e.into_snapshot_error(phase))
    }
}

/// Errors from the hosting service API.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// No credential, or the credential was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The repository or resource does not exist or is not visible.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with an unexpected status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never got an answer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl HostingError {
    /// Returns true if the credential was missing or rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Converts into a [`SnapshotError`] for a call made during `phase`.
    ///
    /// A rejected credential is an authentication error. Everything else,
    /// a missing repository included, names the phase; callers that give
    /// `NotFound` a meaning of its own match on it first.
    pub fn into_snapshot_error(self, phase: Phase) -> SnapshotError {
        match self {
            Self::Unauthorized(msg) => SnapshotError::authentication(msg),
            other => SnapshotError::git(phase, other.to_string()),
        }
    }
}

impl From<reqwest::Error> for HostingError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A destination URL that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlParseError {
    /// The input is not a URL at all.
    #[error("malformed repository URL '{url}': {reason}")]
    Malformed { url: String, reason: String },

    /// The URL uses a scheme other than https or ssh.
    #[error("unsupported scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },

    /// The path does not have exactly an owner and a repository name.
    #[error("repository URL '{0}' must name an owner and a repository")]
    MissingOwnerOrRepo(String),
}

impl From<UrlParseError> for SnapshotError {
    fn from(err: UrlParseError) -> Self {
        SnapshotError::configuration(err.to_string())
    }
}
