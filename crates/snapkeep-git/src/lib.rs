//! # Snapkeep Git Engine
//!
//! Versioned snapshots of a working tree, pushed as branches to a dedicated
//! backup repository, and restored from them.
//!
//! Each snapshot becomes a branch named `v{major}.{minor}/{timestamp}` on
//! the destination, reached through a remote reserved for this engine so the
//! user's own remotes are never touched.
//!
//! ## Features
//!
//! - Git operations via the system `git` CLI behind the [`Vcs`] trait
//! - Hosting API access (branch listing, repository provisioning) behind the
//!   [`HostingApi`] trait, with a GitHub implementation
//! - Restores that shelve and reapply local changes around a forced checkout
//! - A single-flight guard and an interval scheduler
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use snapkeep_git::{AutoConfirm, BackupService, EngineConfig, EnvCredential, GitHubClient};
//!
//! let config = EngineConfig::builder()
//!     .workspace("/work/project")
//!     .destination("https://github.com/acme/project-backups.git")
//!     .interval_minutes(30)
//!     .build()?;
//!
//! let hosting = Arc::new(GitHubClient::new(Arc::new(EnvCredential::default()))?);
//! let service = BackupService::with_git(&config, hosting, Arc::new(AutoConfirm(false)))?;
//!
//! let snapshot = service.trigger_snapshot(Some("before refactor")).await?;
//! println!("pushed {}", snapshot.branch_name);
//! ```

pub mod config;
pub mod destination;
pub mod engine;
pub mod error;
pub mod hosting;
pub mod restore;
pub mod service;
pub mod snapshot;
pub mod sync;
pub mod vcs;

// Re-exports
pub use config::{EngineConfig, EngineConfigBuilder};
pub use destination::{
    BackupDestination, BindOutcome, DEFAULT_REMOTE_ALIAS, RemoteBinder, RepoUrl, UrlScheme,
};
pub use engine::SnapshotEngine;
pub use error::{HostingError, UrlParseError, VcsError, VcsErrorKind};
pub use hosting::{CredentialSource, EnvCredential, GitHubClient, HostingApi, StaticCredential};
pub use restore::{RestoreCoordinator, RestoreState};
pub use service::BackupService;
pub use snapshot::{AutoConfirm, IndexRecoveryGuard, InitPrompt, SnapshotCommitter};
pub use sync::{BackupScheduler, ScheduleState, ScheduleStatus};
pub use vcs::{GitCli, Vcs};

// Re-export snapkeep_core for consumers
pub use snapkeep_core;
