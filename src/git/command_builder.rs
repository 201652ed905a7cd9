//! Fluent builder for running the system `git` binary.
//!
//! Every git invocation in duck goes through [`GitCommand`] so that working
//! directory handling, timeouts, logging and error mapping stay uniform.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::DuckError;
use crate::utils::platform::get_git_command;

/// Builder for a single git invocation.
///
/// ```rust,no_run
/// use duckfile::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::new()
///     .args(["rev-parse", "HEAD"])
///     .current_dir("/path/to/repo")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// Output is always captured. Defaults: 300 second timeout, terminal
/// prompts disabled.
pub struct GitCommand {
    /// Arguments after `git` (and after `-C <dir>` when a directory is set)
    args: Vec<String>,

    /// Passed to git as `-C <dir>`
    current_dir: Option<PathBuf>,

    /// Extra environment for the git process
    env_vars: Vec<(String, String)>,

    /// None waits forever
    timeout_duration: Option<Duration>,

    /// Label prefixed to log lines, usually the target name
    context: Option<String>,

    /// Remote URL for clone commands, used in error messages
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never block on a credential prompt.
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(DEFAULT_GIT_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Empty command with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git against `dir` (`git -C dir ...`).
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for this invocation only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label log lines with `context`, e.g. the target being synced.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn full_args(&self) -> Vec<String> {
        let mut full_args = Vec::with_capacity(self.args.len() + 2);
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        full_args
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn log_prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Execute the command and return the output
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let full_args = self.full_args();
        let prefix = self.log_prefix();

        let mut cmd = Command::new(git_command);
        cmd.args(&full_args).stdin(Stdio::null()).kill_on_drop(true);

        tracing::debug!(
            target: "git",
            "{}Executing command: {} {}",
            prefix,
            git_command,
            full_args.join(" ")
        );

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output_future = cmd.output();

        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.context(format!("Failed to execute git {}", full_args.join(" ")))?
            } else {
                tracing::warn!(
                    target: "git",
                    "{}Command timed out after {} seconds: git {}",
                    prefix,
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(DuckError::GitCommandError {
                    operation: self.operation(),
                    stderr: format!(
                        "Git command timed out after {} seconds. This may indicate:\n\
                        - Network connectivity issues\n\
                        - Authentication prompts waiting for input\n\
                        Try running the command manually: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    ),
                }
                .into());
            }
        } else {
            output_future.await.context(format!("Failed to execute git {}", full_args.join(" ")))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{}Command failed with exit code: {:?}",
                prefix,
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{}Error: {}", prefix, stderr.trim());
            }

            let reason = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };

            let error = match self.args.first().map(String::as_str) {
                Some("clone") => DuckError::GitCloneFailed {
                    url: self.clone_url.clone().unwrap_or_else(|| "unknown".to_string()),
                    reason,
                },
                Some("checkout") => DuckError::GitCheckoutFailed {
                    // Flags come first, the reference is last.
                    reference: self.args.last().cloned().unwrap_or_default(),
                    reason,
                },
                _ => DuckError::GitCommandError {
                    operation: self.operation(),
                    stderr: reason,
                },
            };
            return Err(error.into());
        }

        if !stdout.is_empty() {
            tracing::debug!(target: "git", "{}{}", prefix, stdout.trim());
        }
        if !stderr.is_empty() {
            tracing::debug!(target: "git", "{}{}", prefix, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "git::perf",
                "{}Git {} took {:.2}s",
                prefix,
                self.operation(),
                elapsed.as_secs_f64()
            );
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(
                target: "git::perf",
                "{}Git {} took {}ms",
                prefix,
                self.operation(),
                elapsed.as_millis()
            );
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output from a Git command
#[derive(Debug)]
pub struct GitCommandOutput {
    /// Standard output from the Git command
    pub stdout: String,
    /// Standard error output from the Git command
    pub stderr: String,
}

// Convenience builders for the operations the fetcher needs

impl GitCommand {
    /// `git clone --depth 1 <url> <target>`
    pub fn clone_shallow(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--depth", "1", "--no-checkout"]);
        cmd.args.push(url.to_string());
        cmd.args.push(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// `git fetch --depth 1 origin <ref>`: leaves the commit in `FETCH_HEAD`.
    pub fn fetch_ref(reference: &str) -> Self {
        Self::new().args(["fetch", "--depth", "1", "--force", "origin", reference])
    }

    /// `git checkout --force --detach <ref>`
    pub fn checkout_detached(reference: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", reference])
    }

    /// `git rev-parse HEAD`
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// `git remote get-url origin`
    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }

    /// `git remote set-url origin <url>`
    pub fn set_remote_url(url: &str) -> Self {
        Self::new().args(["remote", "set-url", "origin", url])
    }
}
