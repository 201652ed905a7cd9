//! Template sources.
//!
//! The run pipeline only needs one thing from a source: a local directory
//! holding the tree at a given ref. [`SourceFetcher`] is that capability and
//! [`GitFetcher`] is the production implementation. Tests substitute their
//! own fetchers (see `test_utils`).

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::git::{self, GitRepo, strip_auth_from_url};
use crate::utils::fs::{ensure_parent_dir, normalize_path, remove_dir_all};

/// Materializes a source tree at a ref.
///
/// Implementations must be safe to call repeatedly with the same `workdir`
/// (each call refreshes it) and must fail loudly rather than return a stale
/// or partial tree.
pub trait SourceFetcher: Send + Sync {
    /// Make the tree of `repo` at `reference` available under `workdir` and
    /// return the tree root.
    fn fetch(
        &self,
        repo: &str,
        reference: &str,
        workdir: &Path,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// Fetches templates with the system `git`.
///
/// The working tree is a shallow clone that is re-pointed at the requested
/// ref on every call:
///
/// ```text
/// git clone --depth 1 --no-checkout <repo> <workdir>     (first time only)
/// git -C <workdir> fetch --depth 1 --force origin <ref>
/// git -C <workdir> checkout --force --detach FETCH_HEAD
/// ```
#[derive(Debug, Clone)]
pub struct GitFetcher {
    timeout: Option<Duration>,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_GIT_TIMEOUT),
        }
    }
}

impl GitFetcher {
    /// Fetcher with the default per-operation timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-operation timeout (None waits forever).
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SourceFetcher for GitFetcher {
    async fn fetch(&self, repo: &str, reference: &str, workdir: &Path) -> Result<PathBuf> {
        git::ensure_git_available()?;
        let remote = remote_location(repo)?;

        let label = workdir
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let git_repo = GitRepo::new(workdir).with_timeout(self.timeout).with_context(label);

        if workdir.exists() && !git_repo.is_git_repo() {
            tracing::debug!("Removing non-git directory {}", workdir.display());
            remove_dir_all(workdir)?;
        }

        if git_repo.is_git_repo() {
            match git_repo.get_remote_url().await {
                Ok(url) if same_remote(&url, &remote) => {}
                Ok(url) => {
                    tracing::debug!(
                        "Remote changed from {} to {}",
                        strip_auth_from_url(&url),
                        strip_auth_from_url(&remote)
                    );
                    git_repo.set_remote_url(&remote).await?;
                }
                Err(e) => {
                    // A checkout we cannot inspect is not worth repairing.
                    tracing::debug!("Recloning {}: {e:#}", workdir.display());
                    remove_dir_all(workdir)?;
                }
            }
        }

        if !git_repo.is_git_repo() {
            ensure_parent_dir(workdir)?;
            git_repo.clone_shallow(&remote).await?;
        }

        git_repo.checkout_ref(reference).await.with_context(|| {
            format!("Failed to check out {} at {}", strip_auth_from_url(repo), reference)
        })?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(commit) = git_repo.get_current_commit().await {
                tracing::debug!("{}@{} is at {}", strip_auth_from_url(repo), reference, commit);
            }
        }

        Ok(workdir.to_path_buf())
    }
}

/// Whether `repo` names a directory rather than a URL or an scp-style
/// `host:path` location.
fn is_local_path(repo: &str) -> bool {
    if repo.contains("://") {
        return false;
    }
    match repo.split_once(':') {
        // A single letter before the colon is a Windows drive
        Some((host, _)) => host.len() == 1 || host.contains(['/', '\\']),
        None => true,
    }
}

/// Location handed to git. Local paths are made absolute, since git runs
/// later operations from inside the workdir.
fn remote_location(repo: &str) -> Result<String> {
    if !is_local_path(repo) {
        return Ok(repo.to_string());
    }
    let absolute = std::path::absolute(repo)
        .with_context(|| format!("Failed to resolve template repository path {repo}"))?;
    Ok(normalize_path(&absolute).display().to_string())
}

fn same_remote(stored: &str, wanted: &str) -> bool {
    if stored == wanted {
        return true;
    }
    is_local_path(stored)
        && is_local_path(wanted)
        && normalize_path(Path::new(stored)) == normalize_path(Path::new(wanted))
}
