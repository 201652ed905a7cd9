//! Content-addressed object store.
//!
//! Objects live at `<objects>/<key>/<basename>` and are written once. A key
//! already encodes every input that can change the rendered bytes, so an
//! existing object is never rewritten; [`ContentStore::put`] skips the render
//! entirely when it finds one.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::cache::CacheKey;
use crate::utils::fs::{atomic_write, dir_size, remove_dir_all};

/// What [`ContentStore::put`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The render ran and the object was written.
    Stored,
    /// The object was already there; the render did not run.
    AlreadyPresent,
}

/// Immutable storage for rendered artifacts.
#[derive(Debug, Clone)]
pub struct ContentStore {
    objects_dir: PathBuf,
}

impl ContentStore {
    /// Store rooted at `objects_dir` (usually `<cacheRoot>/objects`).
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
        }
    }

    /// Root of the store.
    #[must_use]
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Directory holding the object for `key`.
    #[must_use]
    pub fn object_dir(&self, key: &CacheKey) -> PathBuf {
        self.objects_dir.join(key.as_str())
    }

    /// Full path of the object for `key`.
    #[must_use]
    pub fn object_path(&self, key: &CacheKey, basename: &str) -> PathBuf {
        self.object_dir(key).join(basename)
    }

    /// Whether the artifact for `key` exists.
    #[must_use]
    pub fn has(&self, key: &CacheKey, basename: &str) -> bool {
        self.object_path(key, basename).is_file()
    }

    /// Store the output of `render` under `key` unless it is already there.
    ///
    /// Two concurrent puts of the same key are harmless: both write identical
    /// bytes through temp-then-rename and the last rename wins.
    pub async fn put<F, Fut>(&self, key: &CacheKey, basename: &str, render: F) -> Result<PutOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        if self.has(key, basename) {
            tracing::info!("Cache hit for {} ({})", basename, key.short());
            return Ok(PutOutcome::AlreadyPresent);
        }

        tracing::info!("Cache miss for {} ({}), rendering", basename, key.short());
        let bytes = render().await?;

        let path = self.object_path(key, basename);
        atomic_write(&path, &bytes)
            .with_context(|| format!("Failed to store object {}", path.display()))?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(PutOutcome::Stored)
    }

    /// Delete the object for `key`. Failures are logged, never returned.
    ///
    /// Returns whether something was removed.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let dir = self.object_dir(key);
        if !dir.exists() {
            return false;
        }
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!("Removed object {}", key.short());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to remove cached object {}: {}", dir.display(), e);
                false
            }
        }
    }

    /// Delete every object.
    pub fn purge(&self) -> Result<()> {
        remove_dir_all(&self.objects_dir)
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Result<Vec<CacheKey>> {
        let entries = match std::fs::read_dir(&self.objects_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list objects in {}", self.objects_dir.display())
                });
            }
        };

        let mut keys: Vec<CacheKey> = entries
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| CacheKey::parse(&entry.file_name().to_string_lossy()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Bytes used by all objects.
    #[must_use]
    pub fn disk_usage(&self) -> u64 {
        dir_size(&self.objects_dir)
    }

    /// Bytes used by one object.
    #[must_use]
    pub fn object_size(&self, key: &CacheKey) -> u64 {
        dir_size(&self.object_dir(key))
    }
}
