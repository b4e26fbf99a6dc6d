//! Monotonic snapshot versions.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v(\d+)\.(\d+)").expect("version pattern is valid"));

/// A `major.minor` snapshot version.
///
/// Ordering compares major first, then minor.
///
/// # Example
///
/// ```
/// use snapkeep_core::SnapshotVersion;
///
/// let v: SnapshotVersion = "2.1".parse().unwrap();
/// assert_eq!(v, SnapshotVersion::new(2, 1));
/// assert_eq!(v.to_string(), "2.1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotVersion {
    major: u32,
    minor: u32,
}

impl SnapshotVersion {
    /// The version given to the first snapshot at a destination.
    pub const INITIAL: Self = Self { major: 1, minor: 0 };

    /// Creates a version. A major of zero is raised to one.
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major: major.max(1),
            minor,
        }
    }

    /// Returns the major component.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Returns the minor component.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns the version with the minor component incremented.
    pub fn next_minor(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor.saturating_add(1),
        }
    }

    /// Extracts the version from the start of a branch name such as
    /// `v1.2/2024-02-01_00-00-00`. Returns `None` if the name does not start
    /// with `v<major>.<minor>`.
    pub fn from_branch_name(name: &str) -> Option<Self> {
        let caps = VERSION_PREFIX.captures(name)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        Some(Self::new(major, minor))
    }
}

impl Default for SnapshotVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SnapshotVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('v');
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("invalid version '{s}': expected major.minor"))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid major version '{major}'"))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid minor version '{minor}'"))?;
        Ok(Self::new(major, minor))
    }
}

/// Derives the next snapshot version from the branch names already present at
/// the destination.
///
/// The highest major wins; among branches sharing it, the highest minor is
/// incremented. Major is never bumped here.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionAllocator;

impl VersionAllocator {
    /// Creates an allocator.
    pub fn new() -> Self {
        Self
    }

    /// Returns the highest version found in `branches`, if any.
    pub fn highest<I, S>(&self, branches: I) -> Option<SnapshotVersion>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        branches
            .into_iter()
            .filter_map(|name| SnapshotVersion::from_branch_name(name.as_ref()))
            .max()
    }

    /// Returns the version for the next snapshot.
    ///
    /// `1.0` if no branch carries a version, otherwise `{maxMajor}.{maxMinor + 1}`.
    pub fn next<I, S>(&self, branches: I) -> SnapshotVersion
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.highest(branches) {
            Some(v) => v.next_minor(),
            None => SnapshotVersion::INITIAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_branch_name() {
        assert_eq!(
            SnapshotVersion::from_branch_name("v1.2/2024-02-01_00-00-00"),
            Some(SnapshotVersion::new(1, 2))
        );
        assert_eq!(
            SnapshotVersion::from_branch_name("v10.33"),
            Some(SnapshotVersion::new(10, 33))
        );
        assert_eq!(SnapshotVersion::from_branch_name("main"), None);
        assert_eq!(SnapshotVersion::from_branch_name("release/v1.2"), None);
        assert_eq!(SnapshotVersion::from_branch_name("v1"), None);
    }

    #[test]
    fn test_next_from_mixed_branches() {
        let branches = [
            "v1.0/2024-01-01_00-00-00",
            "v1.2/2024-02-01_00-00-00",
            "v2.0/2024-03-01_00-00-00",
        ];
        assert_eq!(
            VersionAllocator::new().next(branches),
            SnapshotVersion::new(2, 1)
        );
    }

    #[test]
    fn test_next_empty() {
        let branches: [&str; 0] = [];
        assert_eq!(VersionAllocator::new().next(branches), SnapshotVersion::INITIAL);
    }

    #[test]
    fn test_next_ignores_unversioned() {
        let branches = ["main", "feature/x", "backup-2024"];
        assert_eq!(VersionAllocator::new().next(branches), SnapshotVersion::INITIAL);
    }

    #[test]
    fn test_minor_compared_numerically() {
        let branches = ["v1.9/a", "v1.10/b", "v1.2/c"];
        assert_eq!(
            VersionAllocator::new().next(branches),
            SnapshotVersion::new(1, 11)
        );
    }

    #[test]
    fn test_lower_major_with_higher_minor_ignored() {
        let branches = ["v1.40/a", "v3.1/b", "v2.99/c"];
        assert_eq!(
            VersionAllocator::new().next(branches),
            SnapshotVersion::new(3, 2)
        );
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("1.0".parse::<SnapshotVersion>().unwrap(), SnapshotVersion::INITIAL);
        assert_eq!("v3.4".parse::<SnapshotVersion>().unwrap().to_string(), "3.4");
        assert!("3".parse::<SnapshotVersion>().is_err());
        assert!("a.b".parse::<SnapshotVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(SnapshotVersion::new(2, 0) > SnapshotVersion::new(1, 99));
        assert!(SnapshotVersion::new(1, 10) > SnapshotVersion::new(1, 9));
    }
}
