//! Snapshot branch names and commit messages.
//!
//! A snapshot branch is named `v{major}.{minor}/{timestamp}`, with the
//! timestamp formatted at second precision in UTC. When a name is already
//! taken locally, a short random suffix is appended to the timestamp part;
//! the version part is never touched.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::version::SnapshotVersion;

/// Format used for the timestamp component of snapshot names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Length of a formatted timestamp.
const TIMESTAMP_LEN: usize = 19;

/// Length of the random collision suffix.
const SUFFIX_LEN: usize = 6;

/// Capture time of a snapshot, truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotTimestamp(NaiveDateTime);

impl SnapshotTimestamp {
    /// Returns the current UTC time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Creates a timestamp from a UTC datetime, dropping sub-second precision.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let naive = at.naive_utc();
        Self(naive.with_nanosecond(0).unwrap_or(naive))
    }

    /// Parses a timestamp in [`TIMESTAMP_FORMAT`].
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
            .ok()
            .map(Self)
    }

    /// Returns the underlying datetime.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for SnapshotTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// The parsed form of a snapshot branch name.
///
/// # Example
///
/// ```
/// use snapkeep_core::{SnapshotName, SnapshotVersion};
///
/// let name = SnapshotName::parse("v1.2/2024-02-01_00-00-00").unwrap();
/// assert_eq!(name.version(), SnapshotVersion::new(1, 2));
/// assert_eq!(name.to_string(), "v1.2/2024-02-01_00-00-00");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotName {
    version: SnapshotVersion,
    timestamp: SnapshotTimestamp,
    suffix: Option<String>,
}

impl SnapshotName {
    /// Creates a name from its parts.
    pub fn new(version: SnapshotVersion, timestamp: SnapshotTimestamp) -> Self {
        Self {
            version,
            timestamp,
            suffix: None,
        }
    }

    /// Parses a branch name. Returns `None` for anything that is not a
    /// snapshot branch.
    pub fn parse(branch: &str) -> Option<Self> {
        let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
        let (version_part, rest) = branch.split_once('/')?;
        let version = SnapshotVersion::from_branch_name(version_part)?;
        if version_part != format!("v{version}") {
            return None;
        }

        let ts = rest.get(..TIMESTAMP_LEN)?;
        let timestamp = SnapshotTimestamp::parse(ts)?;
        let suffix = match &rest[TIMESTAMP_LEN..] {
            "" => None,
            tail => Some(tail.strip_prefix('-')?.to_string()),
        };

        Some(Self {
            version,
            timestamp,
            suffix,
        })
    }

    /// Returns the version.
    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    /// Returns the capture timestamp.
    pub fn timestamp(&self) -> SnapshotTimestamp {
        self.timestamp
    }

    /// Returns the collision suffix, if one was added.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Returns a copy of this name with the given collision suffix.
    pub fn with_suffix(&self, suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..self.clone()
        }
    }

    /// Returns the branch name.
    pub fn branch(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}/{}", self.version, self.timestamp)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

/// Builds snapshot names and commit messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotNamer;

impl SnapshotNamer {
    /// Creates a namer.
    pub fn new() -> Self {
        Self
    }

    /// Returns the name for a snapshot of `version` taken at `timestamp`.
    pub fn name(&self, version: SnapshotVersion, timestamp: SnapshotTimestamp) -> SnapshotName {
        SnapshotName::new(version, timestamp)
    }

    /// Returns the commit message for a snapshot.
    ///
    /// The note is only given for operator-initiated snapshots; blank notes
    /// are dropped.
    pub fn commit_message(
        &self,
        version: SnapshotVersion,
        timestamp: SnapshotTimestamp,
        note: Option<&str>,
    ) -> String {
        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) => format!("Snapshot {version} - {timestamp} - {note}"),
            None => format!("Snapshot {version} - {timestamp}"),
        }
    }

    /// Returns `name` with a fresh random suffix, for retrying after a
    /// collision.
    pub fn disambiguate(&self, name: &SnapshotName) -> SnapshotName {
        let id = uuid::Uuid::new_v4().simple().to_string();
        name.with_suffix(&id[..SUFFIX_LEN])
    }
}

/// Checks that a string is usable as a branch name.
///
/// Returns a description of the problem if it is not.
pub fn validate_branch_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("branch name cannot be empty");
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err("branch name cannot start or end with '/'");
    }

    if name.starts_with('-') {
        return Err("branch name cannot start with '-'");
    }

    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return Err("branch name contains an invalid sequence");
    }

    if name.ends_with(".lock") || name.ends_with('.') {
        return Err("branch name has an invalid ending");
    }

    for c in name.chars() {
        if c.is_control()
            || c == ' '
            || c == '~'
            || c == '^'
            || c == ':'
            || c == '?'
            || c == '*'
            || c == '['
            || c == '\\'
        {
            return Err("branch name contains invalid characters");
        }
    }

    Ok(())
}
