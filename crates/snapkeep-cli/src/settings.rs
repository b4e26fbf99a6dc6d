//! Settings loading: optional file, then `SNAPKEEP__*` environment variables.
//!
//! Keys are snake_case in both sources, e.g. `interval_minutes = 30` in
//! `snapkeep.toml` or `SNAPKEEP__INTERVAL_MINUTES=30` in the environment.
//! `excluded_paths` accepts a comma-separated list from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use snapkeep_git::EngineConfig;

/// Base name of the settings file looked up in the working directory.
const DEFAULT_FILE: &str = "snapkeep";

/// Raw settings as read from file and environment.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workspace: Option<PathBuf>,
    pub destination: Option<String>,
    pub remote_alias: Option<String>,
    pub default_branch: Option<String>,
    pub interval_minutes: i64,
    pub stage_batch_size: Option<usize>,
    pub command_timeout_secs: Option<u64>,
    pub network_timeout_secs: Option<u64>,
    pub excluded_paths: Vec<String>,
    pub exclude_orphan_gitlinks: Option<bool>,
    pub create_missing_destination: bool,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    /// Hosting API root, for GitHub Enterprise.
    pub api_base: Option<String>,
}

/// Environment source for `SNAPKEEP__*` variables.
pub fn environment() -> Environment {
    Environment::with_prefix("SNAPKEEP")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("excluded_paths")
}

impl Settings {
    /// Loads settings from `path` (required) or `snapkeep.{toml,yaml,json}`
    /// in the current directory (optional), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    /// Loads settings with an explicit environment source.
    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Applies command-line overrides.
    pub fn with_overrides(mut self, workspace: Option<PathBuf>, destination: Option<String>) -> Self {
        if workspace.is_some() {
            self.workspace = workspace;
        }
        if destination.is_some() {
            self.destination = destination;
        }
        self
    }

    /// Builds the engine configuration.
    ///
    /// A missing workspace defaults to `cwd`.
    pub fn into_engine_config(self, cwd: Option<PathBuf>) -> Result<EngineConfig, String> {
        let mut builder = EngineConfig::builder().interval_minutes(self.interval_minutes);

        if let Some(workspace) = self.workspace.or(cwd) {
            builder = builder.workspace(workspace);
        }
        if let Some(destination) = self.destination {
            builder = builder.destination(destination);
        }
        if let Some(alias) = self.remote_alias {
            builder = builder.remote_alias(alias);
        }
        if let Some(branch) = self.default_branch {
            builder = builder.default_branch(branch);
        }
        if let Some(size) = self.stage_batch_size {
            builder = builder.stage_batch_size(size);
        }
        if let Some(secs) = self.command_timeout_secs {
            builder = builder.command_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.network_timeout_secs {
            builder = builder.network_timeout(Duration::from_secs(secs));
        }
        for pattern in self.excluded_paths {
            builder = builder.exclude(pattern);
        }
        if let Some(exclude) = self.exclude_orphan_gitlinks {
            builder = builder.exclude_orphan_gitlinks(exclude);
        }
        if let (Some(name), Some(email)) = (self.committer_name, self.committer_email) {
            builder = builder.committer(name, email);
        }

        builder
            .create_missing_destination(self.create_missing_destination)
            .build()
    }
}
