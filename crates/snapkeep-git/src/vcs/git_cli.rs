//! [`Vcs`] implementation backed by the system `git` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::status::parse_porcelain_v2;
use super::traits::{CheckoutTarget, IndexEntry, RemoteDirection, Vcs, WorkingTreeState};
use crate::error::{VcsError, VcsErrorKind};

/// Runs `git` as a child process.
///
/// Local commands are bounded by `command_timeout`; push and fetch by
/// `network_timeout`. Terminal prompts are disabled so a missing credential
/// fails instead of hanging.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    command_timeout: Duration,
    network_timeout: Duration,
    identity: Option<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl GitCli {
    /// Creates a runner for `git` on `PATH`.
    pub fn new(command_timeout: Duration, network_timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("git"),
            command_timeout,
            network_timeout,
            identity: None,
            overrides: Vec::new(),
        }
    }

    /// Uses a different git executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Commits with this author and committer identity instead of the
    /// repository's configured one.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    /// Passes `key=value` to every invocation, as `git -c` does.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    async fn run(&self, workdir: &Path, args: &[&str], timeout: Duration) -> Result<String, VcsError> {
        let mut cmd = Command::new(&self.program);
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={name}"))
                .arg("-c")
                .arg(format!("user.email={email}"));
        }
        for (key, value) in &self.overrides {
            cmd.arg("-c").arg(format!("{key}={value}"));
        }
        cmd.args(args)
            .current_dir(workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(args = ?args, workdir = %workdir.display(), "Running git");

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                VcsError::new(
                    VcsErrorKind::Timeout,
                    format!("git {} timed out after {}s", args.join(" "), timeout.as_secs()),
                )
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(VcsError::new(classify(&message, &stdout), message))
    }

    async fn local(&self, workdir: &Path, args: &[&str]) -> Result<String, VcsError> {
        self.run(workdir, args, self.command_timeout).await
    }

    async fn network(&self, workdir: &Path, args: &[&str]) -> Result<String, VcsError> {
        self.run(workdir, args, self.network_timeout).await
    }

    /// Reads the last value of `key`, or `None` if it is unset.
    async fn config_value(&self, workdir: &Path, key: &str) -> Result<Option<String>, VcsError> {
        let out = self
            .local(workdir, &["config", "--default", "", "--get", key])
            .await?;
        let value = out.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    /// Finds the `stash@{n}` ref whose message carries `label`.
    async fn find_stash(&self, workdir: &Path, label: &str) -> Result<String, VcsError> {
        let list = self
            .local(workdir, &["stash", "list", "--format=%gd %gs"])
            .await?;
        list.lines()
            .find(|line| line.ends_with(label))
            .and_then(|line| line.split_whitespace().next())
            .map(str::to_string)
            .ok_or_else(|| VcsError::new(VcsErrorKind::NotFound, format!("no stash labelled '{label}'")))
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(300))
    }
}

/// Maps git's output on failure to an error kind.
fn classify(message: &str, stdout: &str) -> VcsErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("already exists") {
        VcsErrorKind::AlreadyExists
    } else if stdout.contains("CONFLICT") || lower.contains("conflict") {
        VcsErrorKind::Conflict
    } else if lower.contains("couldn't find remote ref")
        || lower.contains("no such remote")
        || lower.contains("did not match any")
        || lower.contains("invalid reference")
        || lower.contains("not a valid ref")
    {
        VcsErrorKind::NotFound
    } else {
        VcsErrorKind::Failed
    }
}

fn parse_index(output: &str) -> Vec<IndexEntry> {
    output
        .split('\0')
        .filter(|r| !r.is_empty())
        .filter_map(|record| {
            let (meta, path) = record.split_once('\t')?;
            let mode = u32::from_str_radix(meta.split(' ').next()?, 8).ok()?;
            Some(IndexEntry {
                mode,
                path: path.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl Vcs for GitCli {
    async fn is_repository(&self, workdir: &Path) -> Result<bool, VcsError> {
        let dir = workdir.to_path_buf();
        tokio::task::spawn_blocking(move || gix::discover(&dir).is_ok())
            .await
            .map_err(|e| VcsError::failed(format!("Discover task failed: {}", e)))
    }

    async fn init(&self, workdir: &Path) -> Result<(), VcsError> {
        self.local(workdir, &["init"]).await.map(drop)
    }

    async fn status(&self, workdir: &Path) -> Result<WorkingTreeState, VcsError> {
        let out = self
            .local(
                workdir,
                &[
                    "status",
                    "--porcelain=v2",
                    "--branch",
                    "-z",
                    "--untracked-files=all",
                ],
            )
            .await?;
        Ok(parse_porcelain_v2(&out))
    }

    async fn checkout(&self, workdir: &Path, target: CheckoutTarget<'_>) -> Result<(), VcsError> {
        match target {
            CheckoutTarget::Create(branch) => {
                self.local(workdir, &["checkout", "-b", branch]).await?;
            },
            CheckoutTarget::Force {
                branch,
                start_point,
            } => {
                self.local(workdir, &["checkout", "--force", "-B", branch, start_point])
                    .await?;
            },
        }
        Ok(())
    }

    async fn add(&self, workdir: &Path, paths: &[String]) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "-A", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.local(workdir, &args).await.map(drop)
    }

    async fn index_entries(&self, workdir: &Path) -> Result<Vec<IndexEntry>, VcsError> {
        let out = self.local(workdir, &["ls-files", "-s", "-z"]).await?;
        Ok(parse_index(&out))
    }

    async fn untrack(&self, workdir: &Path, path: &str) -> Result<(), VcsError> {
        self.local(
            workdir,
            &["rm", "-r", "--cached", "--ignore-unmatch", "-q", "--", path],
        )
        .await
        .map(drop)
    }

    async fn commit(
        &self,
        workdir: &Path,
        message: &str,
        allow_empty: bool,
    ) -> Result<(), VcsError> {
        let mut args = vec!["commit", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.local(workdir, &args).await.map(drop)
    }

    async fn push(
        &self,
        workdir: &Path,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), VcsError> {
        let mut args = vec!["push"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.extend([remote, branch]);
        self.network(workdir, &args).await.map(drop)
    }

    async fn fetch(
        &self,
        workdir: &Path,
        remote: &str,
        branch: Option<&str>,
    ) -> Result<(), VcsError> {
        // Name the tracking ref so it is updated whatever the remote's refspec.
        let refspec = branch.map(|b| format!("+refs/heads/{b}:refs/remotes/{remote}/{b}"));
        let mut args = vec!["fetch", remote];
        if let Some(refspec) = &refspec {
            args.push(refspec.as_str());
        }
        self.network(workdir, &args).await.map(drop)
    }

    async fn stash_push(&self, workdir: &Path, label: &str) -> Result<(), VcsError> {
        self.local(
            workdir,
            &["stash", "push", "--include-untracked", "-m", label],
        )
        .await
        .map(drop)
    }

    async fn stash_pop(&self, workdir: &Path, label: &str) -> Result<(), VcsError> {
        let stash = self.find_stash(workdir, label).await?;
        self.local(workdir, &["stash", "pop", stash.as_str()]).await.map(drop)
    }

    async fn remote_names(&self, workdir: &Path) -> Result<Vec<String>, VcsError> {
        let out = self.local(workdir, &["remote"]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn remote_url(
        &self,
        workdir: &Path,
        name: &str,
        direction: RemoteDirection,
    ) -> Result<Option<String>, VcsError> {
        // Raw config values; `remote get-url` applies insteadOf rewrites.
        if direction == RemoteDirection::Push
            && let Some(url) = self.config_value(workdir, &format!("remote.{name}.pushurl")).await?
        {
            return Ok(Some(url));
        }
        self.config_value(workdir, &format!("remote.{name}.url")).await
    }

    async fn add_remote(&self, workdir: &Path, name: &str, url: &str) -> Result<(), VcsError> {
        self.local(workdir, &["remote", "add", name, url])
            .await
            .map(drop)
    }

    async fn remove_remote(&self, workdir: &Path, name: &str) -> Result<(), VcsError> {
        self.local(workdir, &["remote", "remove", name])
            .await
            .map(drop)
    }
}
