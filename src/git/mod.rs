//! Thin async wrapper around the system `git` binary.
//!
//! duck never links a git library; it shells out the way cargo does with
//! `git-fetch-with-cli`, so SSH agents, credential helpers and `~/.gitconfig`
//! all behave as they do on the command line.
//!
//! Only the handful of operations needed to materialize one commit are
//! exposed: a shallow clone, a shallow fetch of a single ref and a detached
//! checkout of `FETCH_HEAD`.

pub mod command_builder;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::DuckError;
use crate::git::command_builder::GitCommand;

/// A local git working tree.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    timeout: Option<Duration>,
    context: Option<String>,
}

impl GitRepo {
    /// Handle for an existing checkout at `path`. Nothing is checked on disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout: Some(DEFAULT_GIT_TIMEOUT),
            context: None,
        }
    }

    /// Per-operation timeout (None waits forever).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Label used in log lines, usually the target name.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn command(&self, cmd: GitCommand) -> GitCommand {
        let cmd = cmd.current_dir(&self.path).with_timeout(self.timeout);
        match &self.context {
            Some(ctx) => cmd.with_context(ctx.clone()),
            None => cmd,
        }
    }

    /// Shallow-clone `url` into `self.path()` without checking anything out.
    pub async fn clone_shallow(&self, url: &str) -> Result<()> {
        tracing::debug!(
            target: "git",
            "Cloning {} into {}",
            strip_auth_from_url(url),
            self.path.display()
        );
        let mut cmd = GitCommand::clone_shallow(url, &self.path).with_timeout(self.timeout);
        if let Some(ctx) = &self.context {
            cmd = cmd.with_context(ctx.clone());
        }
        cmd.execute_success().await
    }

    /// Fetch `reference` (branch, tag, commit or `HEAD`) at depth 1 and check
    /// it out detached, discarding local changes.
    pub async fn checkout_ref(&self, reference: &str) -> Result<()> {
        self.command(GitCommand::fetch_ref(reference)).execute_success().await?;
        self.command(GitCommand::checkout_detached("FETCH_HEAD"))
            .execute_success()
            .await
            .map_err(|e| match e.downcast::<DuckError>() {
                Ok(DuckError::GitCheckoutFailed { reason, .. }) => DuckError::GitCheckoutFailed {
                    reference: reference.to_string(),
                    reason,
                }
                .into(),
                Ok(other) => other.into(),
                Err(e) => e,
            })
    }

    /// URL of `origin`.
    pub async fn get_remote_url(&self) -> Result<String> {
        self.command(GitCommand::remote_url()).execute_stdout().await
    }

    /// Point `origin` at `url`.
    pub async fn set_remote_url(&self, url: &str) -> Result<()> {
        self.command(GitCommand::set_remote_url(url)).execute_success().await
    }

    /// Full SHA of the checked-out commit.
    pub async fn get_current_commit(&self) -> Result<String> {
        self.command(GitCommand::current_commit()).execute_stdout().await
    }

    /// Whether `self.path()` has a `.git` entry.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        is_valid_git_repo(&self.path)
    }

    /// Working tree location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a runnable git binary is on `PATH`.
#[must_use]
pub fn is_git_installed() -> bool {
    crate::utils::platform::command_exists(crate::utils::platform::get_git_command())
}

/// [`is_git_installed`] as an error.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(DuckError::GitNotFound.into());
    }
    Ok(())
}

/// Whether `path` contains a `.git` entry.
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Drop `user:password@` from an http(s) URL so it can be logged.
#[must_use]
pub fn strip_auth_from_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_string();
    };
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return url.to_string();
    }
    let rest = &url[scheme_end..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    match rest[..host_end].rfind('@') {
        Some(at) => format!("{}{}", &url[..scheme_end], &rest[at + 1..]),
        None => url.to_string(),
    }
}
