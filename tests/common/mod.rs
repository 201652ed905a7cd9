//! Common test utilities for duck integration tests

// Not every helper is used by every test module.
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub use duckfile::test_utils::TestGit;

/// A project directory plus a place for template repositories.
pub struct TestProject {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    project_dir: PathBuf,
    sources_dir: PathBuf,
}

impl TestProject {
    /// Empty project with a sibling `sources/` directory.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("project");
        let sources_dir = temp_dir.path().join("sources");

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&sources_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
            sources_dir,
        })
    }

    /// Project directory (the working directory of every `duck` run)
    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    /// Default cache root
    pub fn cache_path(&self) -> PathBuf {
        self.project_dir.join(".duck")
    }

    /// Write `duck.yaml`
    pub fn write_config(&self, content: &str) -> Result<()> {
        let path = self.project_dir.join("duck.yaml");
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Write a file inside the project
    pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let full = self.project_dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;
        Ok(())
    }

    /// Initialized git repository under `sources/<name>`
    pub fn create_template_repo(&self, name: &str) -> Result<TestGit> {
        let git = TestGit::new(self.sources_dir.join(name));
        git.init()?;
        Ok(git)
    }

    /// Run the `duck` binary in the project directory
    pub fn run_duck(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run_duck_with_env(args, &[])
    }

    /// Run `duck` with extra environment variables
    pub fn run_duck_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
        let output = Command::new(env!("CARGO_BIN_EXE_duck"))
            .args(args)
            .current_dir(&self.project_dir)
            .env_remove("DUCK_CACHE_DIR")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .envs(env.iter().copied())
            .output()
            .context("Failed to run duck")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Command output helper
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Assert the command succeeded
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success,
            "Command failed with code {:?}\nStderr: {}",
            self.code, self.stderr
        );
        self
    }

    /// Assert the command exited with `code`
    pub fn assert_code(&self, code: i32) -> &Self {
        assert_eq!(self.code, Some(code), "Unexpected exit code\nStderr: {}", self.stderr);
        self
    }

    /// Assert stdout contains the given text
    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    /// Assert stderr contains the given text
    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// File assertion helpers
pub struct FileAssert;

impl FileAssert {
    /// Assert a file exists
    pub fn exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    /// Assert a file does not exist
    pub fn not_exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(!path.exists(), "Expected file to not exist: {}", path.display());
    }

    /// Assert a file has exact content
    pub fn equals(path: impl AsRef<Path>, expected: &str) {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
        assert_eq!(content, expected, "File {} content mismatch", path.display());
    }
}

/// Number of objects in a cache root.
pub fn object_count(cache: &Path) -> usize {
    fs::read_dir(cache.join("objects")).map(|entries| entries.count()).unwrap_or(0)
}
