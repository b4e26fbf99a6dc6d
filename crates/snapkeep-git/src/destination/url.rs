//! Repository URL parsing.

use std::fmt;

use gix::bstr::ByteSlice;

use crate::error::UrlParseError;

/// Transport of a repository URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlScheme {
    Https,
    Ssh,
}

/// A hosted repository URL with its owner and name extracted.
///
/// Accepts `https://host/owner/repo[.git]`, `ssh://[user@]host/owner/repo[.git]`
/// and the scp-like `user@host:owner/repo[.git]`.
///
/// # Example
///
/// ```
/// use snapkeep_git::RepoUrl;
///
/// let url = RepoUrl::parse("git@github.com:acme/backups.git").unwrap();
/// assert_eq!(url.owner(), "acme");
/// assert_eq!(url.repo(), "backups");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoUrl {
    raw: String,
    scheme: UrlScheme,
    host: String,
    owner: String,
    repo: String,
}

impl RepoUrl {
    /// Parses a repository URL.
    pub fn parse(input: &str) -> Result<Self, UrlParseError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(UrlParseError::Malformed {
                url: raw.to_string(),
                reason: "empty URL".to_string(),
            });
        }

        let url = gix::url::parse(raw.into()).map_err(|e| UrlParseError::Malformed {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = match url.scheme {
            gix::url::Scheme::Https => UrlScheme::Https,
            gix::url::Scheme::Ssh => UrlScheme::Ssh,
            ref other => {
                return Err(UrlParseError::UnsupportedScheme {
                    url: raw.to_string(),
                    scheme: other.as_str().to_string(),
                });
            },
        };

        let host = url
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UrlParseError::Malformed {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_string();

        let path = url.path.to_str_lossy();
        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut segments = path.split('/');
        let (owner, repo) = match (segments.next(), segments.next(), segments.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                (owner.to_string(), repo.to_string())
            },
            _ => return Err(UrlParseError::MissingOwnerOrRepo(raw.to_string())),
        };

        Ok(Self {
            raw: raw.to_string(),
            scheme,
            host,
            owner,
            repo,
        })
    }

    /// Returns the URL as given, trimmed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the transport.
    pub fn scheme(&self) -> UrlScheme {
        self.scheme
    }

    /// Returns the host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the owning user or organization.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the repository name without `.git`.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Returns `owner/repo`.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Returns true if both URLs name the same repository, whatever the
    /// transport.
    pub fn same_repository(&self, other: &Self) -> bool {
        self.host.eq_ignore_ascii_case(&other.host)
            && self.owner.eq_ignore_ascii_case(&other.owner)
            && self.repo.eq_ignore_ascii_case(&other.repo)
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for RepoUrl {
    type Err = UrlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
