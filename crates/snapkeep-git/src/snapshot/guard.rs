//! Removes known-bad entries from the index before staging.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;

use gix::bstr::ByteSlice;
use glob::Pattern;
use tracing::{debug, warn};

use crate::vcs::{IndexEntry, Vcs};

/// Custom test for index entries that must not reach a snapshot.
pub type ExclusionPredicate = Arc<dyn Fn(&IndexEntry) -> bool + Send + Sync>;

/// Untracks index entries known to break staging.
///
/// An entry is excised if it matches one of the configured globs, satisfies
/// the custom predicate, or is a sub-project reference that `.gitmodules`
/// does not declare (a leftover from an earlier workspace layout). Each entry
/// is untracked on its own. Every failure here is logged and swallowed.
///
/// The same exclusions filter what is staged afterwards, so an untracked file
/// is judged as a regular file and an untracked nested repository as a
/// sub-project reference.
pub struct IndexRecoveryGuard {
    vcs: Arc<dyn Vcs>,
    patterns: Vec<Pattern>,
    predicate: Option<ExclusionPredicate>,
    orphan_gitlinks: bool,
}

impl IndexRecoveryGuard {
    /// Creates a guard that only removes orphan sub-project entries.
    pub fn new(vcs: Arc<dyn Vcs>) -> Self {
        Self {
            vcs,
            patterns: Vec::new(),
            predicate: None,
            orphan_gitlinks: true,
        }
    }

    /// Adds exclusion globs. Invalid patterns are skipped with a warning.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in patterns {
            match Pattern::new(raw.as_ref()) {
                Ok(p) => self.patterns.push(p),
                Err(e) => warn!(pattern = %raw.as_ref(), error = %e, "Ignoring invalid exclusion pattern"),
            }
        }
        self
    }

    /// Sets a custom exclusion predicate.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&IndexEntry) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets whether undeclared sub-project entries are removed.
    pub fn with_orphan_gitlinks(mut self, enabled: bool) -> Self {
        self.orphan_gitlinks = enabled;
        self
    }

    /// Scans the index and untracks every excluded entry.
    ///
    /// Returns the paths that were successfully untracked.
    pub async fn run(&self, workdir: &Path) -> Vec<String> {
        let entries = match self.vcs.index_entries(workdir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not read index, skipping index recovery");
                return Vec::new();
            },
        };

        let declared = if self.orphan_gitlinks && entries.iter().any(IndexEntry::is_gitlink) {
            declared_submodules(workdir).await
        } else {
            HashSet::new()
        };

        let targets: BTreeSet<&str> = entries
            .iter()
            .filter(|e| self.is_excluded(e, &declared))
            .map(|e| e.path.as_str())
            .collect();

        let mut removed = Vec::new();
        for path in targets {
            match self.vcs.untrack(workdir, path).await {
                Ok(()) => {
                    debug!(path = %path, "Untracked invalid index entry");
                    removed.push(path.to_string());
                },
                Err(e) => warn!(path = %path, error = %e, "Failed to untrack index entry"),
            }
        }
        removed
    }

    /// Filters the paths about to be staged.
    ///
    /// Drops duplicates, anything at or under a path the guard just
    /// untracked, and untracked paths the exclusions would have excised had
    /// they been tracked. Without this, staging would add them straight back.
    pub async fn stageable(
        &self,
        workdir: &Path,
        paths: Vec<String>,
        excised: &[String],
    ) -> Vec<String> {
        let declared = if self.orphan_gitlinks && paths.iter().any(|p| p.ends_with('/')) {
            declared_submodules(workdir).await
        } else {
            HashSet::new()
        };

        let mut seen = HashSet::new();
        paths
            .into_iter()
            .filter(|path| {
                let under_excised = excised.iter().any(|ex| {
                    path == ex
                        || path
                            .strip_prefix(ex.as_str())
                            .is_some_and(|rest| rest.starts_with('/'))
                });
                !under_excised && !self.excludes_untracked(path, &declared)
            })
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }

    fn is_excluded(&self, entry: &IndexEntry, declared: &HashSet<String>) -> bool {
        if self.orphan_gitlinks && entry.is_gitlink() && !declared.contains(&entry.path) {
            return true;
        }
        if self.patterns.iter().any(|p| p.matches(&entry.path)) {
            return true;
        }
        self.predicate.as_ref().is_some_and(|f| f(entry))
    }

    /// Status lists a nested repository as its directory with a trailing slash.
    fn excludes_untracked(&self, path: &str, declared: &HashSet<String>) -> bool {
        let entry = match path.strip_suffix('/') {
            Some(dir) => IndexEntry {
                mode: IndexEntry::GITLINK_MODE,
                path: dir.to_string(),
            },
            None => IndexEntry {
                mode: IndexEntry::FILE_MODE,
                path: path.to_string(),
            },
        };
        self.is_excluded(&entry, declared)
    }
}

impl std::fmt::Debug for IndexRecoveryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRecoveryGuard")
            .field("patterns", &self.patterns)
            .field("has_predicate", &self.predicate.is_some())
            .field("orphan_gitlinks", &self.orphan_gitlinks)
            .finish()
    }
}

/// Reads submodule paths declared in `.gitmodules`. A missing or unparsable
/// file declares nothing.
async fn declared_submodules(workdir: &Path) -> HashSet<String> {
    let content = match tokio::fs::read_to_string(workdir.join(".gitmodules")).await {
        Ok(content) => content,
        Err(_) => return HashSet::new(),
    };
    match parse_gitmodules(&content) {
        Ok(declared) => declared,
        Err(e) => {
            warn!(error = %e, "Could not parse .gitmodules, treating every sub-project as undeclared");
            HashSet::new()
        },
    }
}

fn parse_gitmodules(content: &str) -> Result<HashSet<String>, gix::config::parse::Error> {
    let file = gix::config::File::try_from(content)?;
    let declared = file
        .sections_by_name("submodule")
        .into_iter()
        .flatten()
        .filter_map(|section| section.value("path"))
        .map(|path| path.to_str_lossy().trim_end_matches('/').to_string())
        .collect();
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gitmodules() {
        let content = r#"
[submodule "vendor/lib"]
	path = vendor/lib
	url = https://github.com/acme/lib.git
[submodule "tools"]
    path=tools/
"#;
        let declared = parse_gitmodules(content).unwrap();
        assert!(declared.contains("vendor/lib"));
        assert!(declared.contains("tools"));
        assert_eq!(declared.len(), 2);
    }

    #[test]
    fn test_parse_gitmodules_quotes_and_comments() {
        let content = r#"
# generated
[submodule "docs"]
	path = "docs site"
	url = https://github.com/acme/docs.git
[submodule "lib"]
	path = lib ; legacy layout
	url = https://github.com/acme/lib.git # mirror
"#;
        let declared = parse_gitmodules(content).unwrap();
        assert!(declared.contains("docs site"));
        assert!(declared.contains("lib"));
        assert_eq!(declared.len(), 2);
    }

    #[test]
    fn test_parse_gitmodules_ignores_other_sections() {
        let content = "[core]\n\tpath = nope\n[submodule \"a\"]\n\tpath = a\n";
        let declared = parse_gitmodules(content).unwrap();
        assert_eq!(declared, HashSet::from(["a".to_string()]));
    }

    mod stageable {
        use super::*;
        use crate::error::VcsError;
        use crate::vcs::{CheckoutTarget, RemoteDirection, WorkingTreeState};
        use async_trait::async_trait;

        struct NoVcs;

        #[async_trait]
        impl Vcs for NoVcs {
            async fn is_repository(&self, _: &Path) -> Result<bool, VcsError> {
                Ok(true)
            }
            async fn init(&self, _: &Path) -> Result<(), VcsError> {
                Ok(())
            }
            async fn status(&self, _: &Path) -> Result<WorkingTreeState, VcsError> {
                Err(VcsError::failed("unused"))
            }
            async fn checkout(&self, _: &Path, _: CheckoutTarget<'_>) -> Result<(), VcsError> {
                Ok(())
            }
            async fn add(&self, _: &Path, _: &[String]) -> Result<(), VcsError> {
                Ok(())
            }
            async fn index_entries(&self, _: &Path) -> Result<Vec<IndexEntry>, VcsError> {
                Ok(Vec::new())
            }
            async fn untrack(&self, _: &Path, _: &str) -> Result<(), VcsError> {
                Ok(())
            }
            async fn commit(&self, _: &Path, _: &str, _: bool) -> Result<(), VcsError> {
                Ok(())
            }
            async fn push(&self, _: &Path, _: &str, _: &str, _: bool) -> Result<(), VcsError> {
                Ok(())
            }
            async fn fetch(&self, _: &Path, _: &str, _: Option<&str>) -> Result<(), VcsError> {
                Ok(())
            }
            async fn stash_push(&self, _: &Path, _: &str) -> Result<(), VcsError> {
                Ok(())
            }
            async fn stash_pop(&self, _: &Path, _: &str) -> Result<(), VcsError> {
                Ok(())
            }
            async fn remote_names(&self, _: &Path) -> Result<Vec<String>, VcsError> {
                Ok(Vec::new())
            }
            async fn remote_url(
                &self,
                _: &Path,
                _: &str,
                _: RemoteDirection,
            ) -> Result<Option<String>, VcsError> {
                Ok(None)
            }
            async fn add_remote(&self, _: &Path, _: &str, _: &str) -> Result<(), VcsError> {
                Ok(())
            }
            async fn remove_remote(&self, _: &Path, _: &str) -> Result<(), VcsError> {
                Ok(())
            }
        }

        fn paths(list: &[&str]) -> Vec<String> {
            list.iter().map(|p| p.to_string()).collect()
        }

        #[tokio::test]
        async fn test_excised_paths_are_not_restaged() {
            let dir = tempfile::tempdir().unwrap();
            let guard = IndexRecoveryGuard::new(Arc::new(NoVcs)).with_patterns(["legacy/**"]);

            let staged = guard
                .stageable(
                    dir.path(),
                    paths(&["keep.txt", "legacy/broken.bin", "legacy/broken.bin", "keep.txt"]),
                    &paths(&["legacy/broken.bin"]),
                )
                .await;

            assert_eq!(staged, paths(&["keep.txt"]));
        }

        #[tokio::test]
        async fn test_untracked_matches_are_dropped() {
            let dir = tempfile::tempdir().unwrap();
            let guard = IndexRecoveryGuard::new(Arc::new(NoVcs))
                .with_patterns(["*.tmp"])
                .with_predicate(|e| e.path.starts_with("secrets/"));

            let staged = guard
                .stageable(
                    dir.path(),
                    paths(&["a.tmp", "secrets/key", "src/lib.rs"]),
                    &[],
                )
                .await;

            assert_eq!(staged, paths(&["src/lib.rs"]));
        }

        #[tokio::test]
        async fn test_nested_repository_kept_only_when_declared() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join(".gitmodules"),
                "[submodule \"lib\"]\n\tpath = vendor/lib\n",
            )
            .unwrap();
            let guard = IndexRecoveryGuard::new(Arc::new(NoVcs));

            let staged = guard
                .stageable(
                    dir.path(),
                    paths(&["vendor/lib/", "vendor/old/", "vendor/old"]),
                    &paths(&["vendor/old"]),
                )
                .await;

            assert_eq!(staged, paths(&["vendor/lib/"]));
        }
    }
}
