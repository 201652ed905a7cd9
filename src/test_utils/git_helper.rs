//! Git test helper utilities
//!
//! Builds throwaway template repositories for fetcher and CLI tests.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command wrapper for tests.
///
/// Commits are made with a fixed identity and without signing so they work
/// regardless of the developer's global git configuration.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    /// Wrap the repository at `repo_path` (which may not exist yet).
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Create the directory, `git init` it and configure a test identity.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init", "-q"], "Failed to initialize git repository")?;
        self.config_user()
    }

    /// Configure git user for tests
    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@duck.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(
            &["config", "user.name", "Test User"],
            "Failed to configure git user name",
        )?;
        self.run_git_command(
            &["config", "commit.gpgsign", "false"],
            "Failed to disable commit signing",
        )?;
        Ok(())
    }

    /// Write `content` to `relative` inside the working tree.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.repo_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Add all files to staging
    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    /// Create a commit with the given message
    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "-q", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Write, stage and commit one file.
    pub fn commit_file(&self, relative: &str, content: &str, message: &str) -> Result<()> {
        self.write_file(relative, content)?;
        self.add_all()?;
        self.commit(message)
    }

    /// Create a tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// SHA of `HEAD`.
    pub fn rev_parse_head(&self) -> Result<String> {
        let output =
            self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Repository location
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// `file://` URL usable as a template `repo`.
    pub fn file_url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }
}
