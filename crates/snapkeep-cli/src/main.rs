//! Snapkeep command line.

mod prompt;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snapkeep_core::{RestoreResult, SnapshotError};
use snapkeep_git::{AutoConfirm, BackupService, EnvCredential, GitHubClient, HostingApi, InitPrompt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::prompt::TerminalPrompt;
use crate::settings::Settings;

#[derive(Parser)]
#[command(
    name = "snapkeep",
    version,
    about = "Versioned snapshots of a working tree, pushed as branches to a backup repository"
)]
struct Cli {
    /// Settings file (defaults to ./snapkeep.toml if present)
    #[arg(short, long, global = true, env = "SNAPKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Working tree to snapshot (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Destination repository URL (https or ssh)
    #[arg(short, long, global = true)]
    destination: Option<String>,

    /// Initialize a repository without asking
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take a snapshot now
    Snapshot {
        /// Note appended to the commit message
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Restore a snapshot branch into the working tree
    Restore {
        /// Snapshot branch, e.g. v1.2/2024-02-01_00-00-00
        branch: String,
    },

    /// Restore the most recent snapshot
    RestoreLatest,

    /// List snapshots at the destination, newest first
    #[command(alias = "ls")]
    List,

    /// Take scheduled snapshots until interrupted
    Watch {
        /// Minutes between snapshots (overrides settings)
        #[arg(short, long)]
        interval: Option<i64>,
    },

    /// Create a private repository and use it as the destination
    Provision {
        /// Repository name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .context("failed to load settings")?
        .with_overrides(cli.workspace, cli.destination);
    let api_base = settings.api_base.clone();
    let config = settings
        .into_engine_config(std::env::current_dir().ok())
        .map_err(anyhow::Error::msg)
        .context("invalid settings")?;

    let credentials = Arc::new(EnvCredential::default());
    let hosting: Arc<dyn HostingApi> = match api_base {
        Some(base) => Arc::new(GitHubClient::with_api_base(
            credentials,
            base,
            config.network_timeout(),
        )?),
        None => Arc::new(GitHubClient::new(credentials)?),
    };
    let prompt: Arc<dyn InitPrompt> = if cli.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(TerminalPrompt)
    };

    let service = BackupService::with_git(&config, hosting, prompt)?;

    tracing::debug!("Starting snapkeep v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Snapshot { note } => match service.trigger_snapshot(note.as_deref()).await {
            Ok(result) => {
                if result.is_empty() {
                    println!("Pushed {} (no changes)", result.branch_name);
                } else {
                    println!(
                        "Pushed {} ({} paths)",
                        result.branch_name, result.staged_paths
                    );
                }
                for warning in &result.warnings {
                    println!("warning: {warning}");
                }
            },
            Err(SnapshotError::Cancelled(reason)) => println!("Aborted: {reason}"),
            Err(e) => return Err(e.into()),
        },
        Command::Restore { branch } => report_restore(&service.restore(&branch).await?),
        Command::RestoreLatest => report_restore(&service.restore_latest().await?),
        Command::List => {
            let names = service.list_snapshots().await?;
            if names.is_empty() {
                println!("No snapshots.");
            }
            for name in names {
                println!("{name}");
            }
        },
        Command::Watch { interval } => {
            if let Some(minutes) = interval {
                service.set_interval(minutes);
            }
            service.start();
            if !service.status().running {
                anyhow::bail!("scheduling is disabled; set interval_minutes or pass --interval");
            }

            tracing::info!(
                minutes = service.status().interval_minutes,
                "Watching, press Ctrl+C to stop"
            );
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl+C")?;
            service.stop();

            let status = service.status();
            if let Some(branch) = status.last_branch {
                println!("Last snapshot: {branch}");
            }
            if let Some(error) = status.last_error {
                println!("Last error: {error}");
            }
        },
        Command::Provision { name } => {
            let url = service.provision_destination(&name).await?;
            println!("Created {url}");
            println!("Set destination = \"{url}\" in your settings to keep using it.");
        },
    }

    Ok(())
}

fn report_restore(result: &RestoreResult) {
    println!("Restored {}", result.branch_name);
    match (&result.conflict_label, &result.shelf_label) {
        (Some(label), _) => println!(
            "Local changes conflicted with the snapshot and remain stashed as '{label}'. \
             Resolve them with `git stash list` and `git stash pop`."
        ),
        (None, Some(_)) => println!("Local changes were reapplied."),
        (None, None) => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "snapkeep",
            "snapshot",
            "--note",
            "before refactor",
            "--yes",
            "-d",
            "git@github.com:acme/backups.git",
        ])
        .unwrap();

        assert!(cli.yes);
        assert_eq!(cli.destination.as_deref(), Some("git@github.com:acme/backups.git"));
        assert!(matches!(cli.command, Command::Snapshot { note: Some(ref n) } if n == "before refactor"));
    }

    #[test]
    fn test_restore_requires_branch() {
        assert!(Cli::try_parse_from(["snapkeep", "restore"]).is_err());
        let cli = Cli::try_parse_from(["snapkeep", "restore", "v1.0/2024-01-01_00-00-00"]).unwrap();
        assert!(matches!(cli.command, Command::Restore { ref branch } if branch == "v1.0/2024-01-01_00-00-00"));
    }

    #[test]
    fn test_watch_interval() {
        let cli = Cli::try_parse_from(["snapkeep", "watch", "--interval", "15"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval: Some(15) }));
    }
}
