//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::destination::DEFAULT_REMOTE_ALIAS;

/// Configuration for the snapshot engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Root of the working tree to snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workspace: Option<PathBuf>,

    /// Destination repository URL (HTTPS or SSH).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<String>,

    /// Name of the remote reserved for backups.
    #[serde(default = "default_remote_alias")]
    remote_alias: String,

    /// Branch created in a repository that has no commits yet.
    #[serde(default = "default_branch")]
    default_branch: String,

    /// Minutes between scheduled snapshots. Zero or negative disables them.
    #[serde(default)]
    interval_minutes: i64,

    /// Maximum number of paths per staging command.
    #[serde(default = "default_stage_batch_size")]
    stage_batch_size: usize,

    /// Timeout for local git commands.
    #[serde(default = "default_command_timeout", with = "duration_secs")]
    command_timeout: Duration,

    /// Timeout for push and fetch.
    #[serde(default = "default_network_timeout", with = "duration_secs")]
    network_timeout: Duration,

    /// Glob patterns of tracked paths to remove from the index before staging.
    #[serde(default)]
    excluded_paths: Vec<String>,

    /// Whether to untrack sub-project entries not declared in `.gitmodules`.
    #[serde(default = "default_true")]
    exclude_orphan_gitlinks: bool,

    /// Whether to create the destination repository if it does not exist.
    #[serde(default)]
    create_missing_destination: bool,

    /// Commit author name override (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    committer_name: Option<String>,

    /// Commit author email override (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    committer_email: Option<String>,
}

fn default_remote_alias() -> String {
    DEFAULT_REMOTE_ALIAS.to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_stage_batch_size() -> usize {
    100
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_network_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            destination: None,
            remote_alias: default_remote_alias(),
            default_branch: default_branch(),
            interval_minutes: 0,
            stage_batch_size: default_stage_batch_size(),
            command_timeout: default_command_timeout(),
            network_timeout: default_network_timeout(),
            excluded_paths: Vec::new(),
            exclude_orphan_gitlinks: true,
            create_missing_destination: false,
            committer_name: None,
            committer_email: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Returns the workspace root.
    pub fn workspace(&self) -> Option<&PathBuf> {
        self.workspace.as_ref()
    }

    /// Returns the configured destination URL.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Returns the reserved remote alias.
    pub fn remote_alias(&self) -> &str {
        &self.remote_alias
    }

    /// Returns the branch created in an empty repository.
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Returns the schedule interval in minutes.
    pub fn interval_minutes(&self) -> i64 {
        self.interval_minutes
    }

    /// Returns the schedule interval, or `None` if scheduling is disabled.
    pub fn interval(&self) -> Option<Duration> {
        interval_from_minutes(self.interval_minutes)
    }

    /// Returns the staging batch size, never zero.
    pub fn stage_batch_size(&self) -> usize {
        self.stage_batch_size.max(1)
    }

    /// Returns the local command timeout.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Returns the network command timeout.
    pub fn network_timeout(&self) -> Duration {
        self.network_timeout
    }

    /// Returns the exclusion globs.
    pub fn excluded_paths(&self) -> &[String] {
        &self.excluded_paths
    }

    /// Returns whether orphan sub-project entries are untracked.
    pub fn exclude_orphan_gitlinks(&self) -> bool {
        self.exclude_orphan_gitlinks
    }

    /// Returns whether a missing destination repository is created.
    pub fn create_missing_destination(&self) -> bool {
        self.create_missing_destination
    }

    /// Returns the commit identity override, if both parts are set.
    pub fn committer(&self) -> Option<(&str, &str)> {
        match (&self.committer_name, &self.committer_email) {
            (Some(name), Some(email)) => Some((name.as_str(), email.as_str())),
            _ => None,
        }
    }
}

/// Converts a minute count into a timer period. Zero or negative disables.
pub fn interval_from_minutes(minutes: i64) -> Option<Duration> {
    u64::try_from(minutes)
        .ok()
        .filter(|m| *m > 0)
        .map(|m| Duration::from_secs(m.saturating_mul(60)))
}

/// Builder for EngineConfig.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfigOverrides,
}

#[derive(Debug, Default)]
struct EngineConfigOverrides {
    workspace: Option<PathBuf>,
    destination: Option<String>,
    remote_alias: Option<String>,
    default_branch: Option<String>,
    interval_minutes: Option<i64>,
    stage_batch_size: Option<usize>,
    command_timeout: Option<Duration>,
    network_timeout: Option<Duration>,
    excluded_paths: Vec<String>,
    exclude_orphan_gitlinks: Option<bool>,
    create_missing_destination: bool,
    committer: Option<(String, String)>,
}

impl EngineConfigBuilder {
    /// Sets the workspace root.
    pub fn workspace(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workspace = Some(path.into());
        self
    }

    /// Sets the destination URL.
    pub fn destination(mut self, url: impl Into<String>) -> Self {
        self.config.destination = Some(url.into());
        self
    }

    /// Sets the reserved remote alias.
    pub fn remote_alias(mut self, alias: impl Into<String>) -> Self {
        self.config.remote_alias = Some(alias.into());
        self
    }

    /// Sets the branch created in an empty repository.
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.default_branch = Some(branch.into());
        self
    }

    /// Sets the schedule interval in minutes.
    pub fn interval_minutes(mut self, minutes: i64) -> Self {
        self.config.interval_minutes = Some(minutes);
        self
    }

    /// Sets the staging batch size.
    pub fn stage_batch_size(mut self, size: usize) -> Self {
        self.config.stage_batch_size = Some(size);
        self
    }

    /// Sets the local command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = Some(timeout);
        self
    }

    /// Sets the network command timeout.
    pub fn network_timeout(mut self, timeout: Duration) -> Self {
        self.config.network_timeout = Some(timeout);
        self
    }

    /// Adds an exclusion glob.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.config.excluded_paths.push(pattern.into());
        self
    }

    /// Sets whether orphan sub-project entries are untracked.
    pub fn exclude_orphan_gitlinks(mut self, exclude: bool) -> Self {
        self.config.exclude_orphan_gitlinks = Some(exclude);
        self
    }

    /// Sets whether a missing destination repository is created.
    pub fn create_missing_destination(mut self, create: bool) -> Self {
        self.config.create_missing_destination = create;
        self
    }

    /// Sets the commit identity override.
    pub fn committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.config.committer = Some((name.into(), email.into()));
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclusion pattern is not a valid glob or the
    /// remote alias is empty.
    pub fn build(self) -> Result<EngineConfig, String> {
        let c = self.config;
        for pattern in &c.excluded_paths {
            glob::Pattern::new(pattern)
                .map_err(|e| format!("invalid exclusion pattern '{pattern}': {e}"))?;
        }

        let remote_alias = c.remote_alias.unwrap_or_else(default_remote_alias);
        if remote_alias.trim().is_empty() {
            return Err("remote alias cannot be empty".to_string());
        }

        let (committer_name, committer_email) = match c.committer {
            Some((name, email)) => (Some(name), Some(email)),
            None => (None, None),
        };

        Ok(EngineConfig {
            workspace: c.workspace,
            destination: c.destination,
            remote_alias,
            default_branch: c.default_branch.unwrap_or_else(default_branch),
            interval_minutes: c.interval_minutes.unwrap_or(0),
            stage_batch_size: c.stage_batch_size.unwrap_or_else(default_stage_batch_size),
            command_timeout: c.command_timeout.unwrap_or_else(default_command_timeout),
            network_timeout: c.network_timeout.unwrap_or_else(default_network_timeout),
            excluded_paths: c.excluded_paths,
            exclude_orphan_gitlinks: c.exclude_orphan_gitlinks.unwrap_or(true),
            create_missing_destination: c.create_missing_destination,
            committer_name,
            committer_email,
        })
    }
}


mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
