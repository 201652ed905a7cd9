//! On-disk cache for rendered templates.
//!
//! ```text
//! <cacheRoot>/                     (default .duck)
//! ├── objects/
//! │   └── <key>/<basename>         immutable rendered artifacts
//! └── <target>/
//!     ├── <basename> -> ../objects/<key>/<basename>   stable link
//!     └── repo/                    git checkout used by the fetcher
//! ```
//!
//! The pieces are deliberately separate types: [`key`] derives addresses,
//! [`ContentStore`] owns the objects and [`link`] owns the per-target
//! pointers. [`Cache`] only knows where each of them lives.

pub mod key;
pub mod link;
pub mod store;

pub use key::CacheKey;
pub use link::RedirectOutcome;
pub use store::{ContentStore, PutOutcome};

use std::path::{Path, PathBuf};

use crate::config::Target;
use crate::constants::{FETCH_WORKDIR, OBJECTS_DIR};

/// Layout of a cache root.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    store: ContentStore,
}

impl Cache {
    /// Cache rooted at `root`. Nothing is created until something is stored.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store = ContentStore::new(root.join(OBJECTS_DIR));
        Self { root, store }
    }

    /// Cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object store.
    #[must_use]
    pub const fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Per-target directory.
    #[must_use]
    pub fn target_dir(&self, target_name: &str) -> PathBuf {
        self.root.join(target_name)
    }

    /// Where the fetcher keeps its working tree for a target.
    #[must_use]
    pub fn fetch_workdir(&self, target_name: &str) -> PathBuf {
        self.target_dir(target_name).join(FETCH_WORKDIR)
    }

    /// Stable link path: `renderedPath` when the target sets one, else
    /// `<root>/<target>/<basename>`.
    #[must_use]
    pub fn link_path(&self, target_name: &str, target: &Target) -> PathBuf {
        match &target.rendered_path {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => self.target_dir(target_name).join(target.basename()),
        }
    }
}
