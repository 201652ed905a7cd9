//! The run pipeline.
//!
//! Every entry point walks the same stages, strictly in order:
//!
//! ```text
//! resolve variables → derive key → hit: skip | miss: fetch + render + store
//!                   → redirect stable link (+ drop superseded object) → execute
//! ```
//!
//! [`Runner::exec`] runs all of them, [`Runner::sync`] stops before executing
//! and [`Runner::clean`] undoes what the first two leave on disk.

pub mod executor;

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cache::{Cache, CacheKey, PutOutcome, RedirectOutcome, link};
use crate::config::Target;
use crate::core::DuckError;
use crate::source::SourceFetcher;
use crate::templating::{RenderOptions, TemplateRenderer};
use crate::utils::fs::{dir_size, remove_dir_all};
use crate::variables::VariableResolver;

/// What a sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Key of the object the link now points at
    pub key: CacheKey,
    /// Stable link path
    pub link_path: PathBuf,
    /// Whether the template was fetched and rendered (false on a cache hit)
    pub rendered: bool,
    /// Whether the link was rewritten
    pub link_changed: bool,
    /// Object the link pointed at before, when it was a different one
    pub superseded: Option<CacheKey>,
}

/// What to clean.
#[derive(Debug, Clone, Copy)]
pub enum CleanScope<'a> {
    /// The whole cache root.
    All,
    /// One target's object, directory and custom link.
    Target {
        /// Target name
        name: &'a str,
        /// Target record
        target: &'a Target,
    },
}

/// What a clean removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Content objects deleted
    pub objects_removed: usize,
    /// Per-target directories deleted
    pub dirs_removed: usize,
    /// Bytes of regular files deleted
    pub bytes_freed: u64,
}

/// Drives targets through the pipeline.
pub struct Runner<F> {
    cache: Cache,
    fetcher: F,
    resolver: VariableResolver,
    renderer: TemplateRenderer,
}

impl<F: SourceFetcher> Runner<F> {
    /// Assemble a runner from its collaborators.
    pub fn new(
        cache: Cache,
        fetcher: F,
        resolver: VariableResolver,
        renderer: TemplateRenderer,
    ) -> Self {
        Self {
            cache,
            fetcher,
            resolver,
            renderer,
        }
    }

    /// Cache layout in use.
    pub const fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Fetcher in use.
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Materialize `target` and run its binary with `passthrough` appended.
    ///
    /// Returns once the child has exited. A non-zero exit is reported as
    /// [`DuckError::ChildExited`].
    pub async fn exec(&self, target: &Target, name: &str, passthrough: &[String]) -> Result<()> {
        let report = self.materialize(target, name, false).await?;
        let args =
            executor::build_args(&target.file_flag, &report.link_path, &target.args, passthrough);
        executor::execute(&target.binary, &args).await?;
        Ok(())
    }

    /// Materialize `target` without running anything. `force` discards the
    /// current object first so the template is fetched and rendered again.
    pub async fn sync(&self, target: &Target, name: &str, force: bool) -> Result<SyncReport> {
        self.materialize(target, name, force).await
    }

    /// Remove cached state.
    pub async fn clean(&self, scope: CleanScope<'_>) -> Result<CleanReport> {
        match scope {
            CleanScope::All => self.clean_all(),
            CleanScope::Target { name, target } => self.clean_target(name, target),
        }
    }

    async fn materialize(&self, target: &Target, name: &str, force: bool) -> Result<SyncReport> {
        let spec = &target.template;
        let reference = spec.effective_ref();

        tracing::debug!("Resolving {} variable(s) for {}", target.variables.len(), name);
        let vars = self.resolver.resolve(&target.variables).await?;

        let key = CacheKey::derive(&spec.repo, reference, &spec.path, &vars)
            .context("Failed to derive cache key")?;
        tracing::debug!("Target {} has cache key {}", name, key);

        let basename = target.basename();
        let store = self.cache.store();
        if force && store.remove(&key) {
            tracing::debug!("Dropped {} for a forced render", key.short());
        }

        let workdir = self.cache.fetch_workdir(name);
        let fetcher = &self.fetcher;
        let renderer = &self.renderer;
        let vars = &vars;
        let workdir = workdir.as_path();
        let options = RenderOptions {
            template_name: basename.clone(),
            delimiters: spec.delimiters(),
            missing_key: spec.missing_key_policy(),
        };
        let options = &options;

        let outcome = store
            .put(&key, &basename, move || async move {
                let tree = fetcher.fetch(&spec.repo, reference, workdir).await.map_err(|e| {
                    DuckError::Fetch {
                        repo: spec.repo.clone(),
                        reference: reference.to_string(),
                        source: e.into(),
                    }
                })?;

                let template_path = tree.join(&spec.path);
                let source = tokio::fs::read(&template_path).await.map_err(|e| {
                    DuckError::Fetch {
                        repo: spec.repo.clone(),
                        reference: reference.to_string(),
                        source: format!("template '{}' not found in the fetched tree: {e}", spec.path)
                            .into(),
                    }
                })?;

                let rendered = renderer.render(&source, options, vars).map_err(DuckError::from)?;
                Ok::<_, anyhow::Error>(rendered)
            })
            .await?;

        let object = store.object_path(&key, &basename);
        let link_path = self.cache.link_path(name, target);
        let previous = link::current_target(&link_path);
        let redirected = link::redirect(&link_path, &object)?;
        if redirected == RedirectOutcome::Updated {
            tracing::info!("Pointed {} at {}", link_path.display(), key.short());
        }

        let superseded = match previous {
            Some(prev) if prev != key => {
                tracing::debug!("Dropping superseded object {}", prev.short());
                store.remove(&prev);
                Some(prev)
            }
            _ => None,
        };

        Ok(SyncReport {
            key,
            link_path,
            rendered: outcome == PutOutcome::Stored,
            link_changed: redirected == RedirectOutcome::Updated,
            superseded,
        })
    }

    fn clean_all(&self) -> Result<CleanReport> {
        let root = self.cache.root();
        if !root.exists() {
            return Ok(CleanReport::default());
        }

        let objects_dir = self.cache.store().objects_dir();
        let mut report = CleanReport {
            objects_removed: self.cache.store().keys()?.len(),
            dirs_removed: 0,
            bytes_freed: dir_size(root),
        };
        for entry in std::fs::read_dir(root)
            .with_context(|| format!("Failed to read cache root {}", root.display()))?
        {
            let path = entry?.path();
            if path.is_dir() && path != objects_dir {
                report.dirs_removed += 1;
            }
        }

        tracing::debug!(
            "Purging {} object(s), {} bytes",
            report.objects_removed,
            self.cache.store().disk_usage()
        );
        self.cache.store().purge()?;
        remove_dir_all(root)?;
        tracing::info!("Removed cache root {}", root.display());
        Ok(report)
    }

    fn clean_target(&self, name: &str, target: &Target) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        let store = self.cache.store();
        let link_path = self.cache.link_path(name, target);

        if let Some(key) = link::current_target(&link_path) {
            let size = store.object_size(&key);
            if store.remove(&key) {
                report.objects_removed += 1;
                report.bytes_freed += size;
            }
        }

        let target_dir = self.cache.target_dir(name);
        if target_dir.exists() {
            report.bytes_freed += dir_size(&target_dir);
            remove_dir_all(&target_dir)?;
            report.dirs_removed += 1;
            tracing::debug!("Removed {}", target_dir.display());
        }

        // A custom link lives outside the target directory. Only a symlink is
        // removed; a regular file at that path belongs to the user.
        if target.rendered_path.is_some() {
            let is_symlink = std::fs::symlink_metadata(&link_path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_symlink {
                std::fs::remove_file(&link_path)
                    .with_context(|| format!("Failed to remove link {}", link_path.display()))?;
            }
        }

        Ok(report)
    }
}
