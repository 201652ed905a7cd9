//! Test utilities for duck
//!
//! Shared by unit tests and, through the `test-utils` feature, by the
//! integration suite:
//!
//! - [`init_test_logging`] wires `tracing` into the test harness output.
//! - [`FakeFetcher`] and [`FailingFetcher`] stand in for git.
//! - [`TestGit`] builds real template repositories for end-to-end tests.

pub mod git_helper;

pub use git_helper::TestGit;

use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once, PoisonError};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::source::SourceFetcher;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// `level` wins over `RUST_LOG`; with neither, nothing is logged.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// In-memory source tree.
///
/// Every fetch recreates `workdir` from the configured files and records the
/// request, so tests can assert how often (and for what) the pipeline
/// actually fetched.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    files: BTreeMap<String, String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeFetcher {
    /// Fetcher with an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at `path` (relative, `/`-separated).
    #[must_use]
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(repo, ref)` of every fetch, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn materialize(&self, workdir: &Path) -> Result<()> {
        if workdir.exists() {
            std::fs::remove_dir_all(workdir)?;
        }
        std::fs::create_dir_all(workdir)?;
        for (path, content) in &self.files {
            let full = workdir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, content)?;
        }
        Ok(())
    }
}

impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, repo: &str, reference: &str, workdir: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((repo.to_string(), reference.to_string()));
        self.materialize(workdir)?;
        Ok(workdir.to_path_buf())
    }
}

/// Fetcher that always fails with `message`.
#[derive(Debug)]
pub struct FailingFetcher {
    message: String,
    calls: AtomicUsize,
}

impl FailingFetcher {
    /// Fetcher failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetch attempts so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceFetcher for FailingFetcher {
    async fn fetch(&self, _repo: &str, _reference: &str, _workdir: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("{}", self.message)
    }
}
