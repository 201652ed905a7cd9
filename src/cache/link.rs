//! Stable links.
//!
//! Every target owns one symlink (by default `<cacheRoot>/<target>/<basename>`)
//! that points into the object store. It is the only mutable pointer in the
//! cache: after a successful run it always resolves to an existing object, and
//! reading it back before a redirect tells the runner which object the target
//! used last, so that one can be collected.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::cache::CacheKey;
use crate::constants::OBJECTS_DIR;
use crate::core::DuckError;
use crate::utils::fs::{ensure_dir, normalize_path, relative_path};

/// What [`redirect`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// The link already pointed at the object; nothing was written.
    Unchanged,
    /// The link was created or replaced.
    Updated,
}

/// Key of the object `link` currently points at.
///
/// `None` when the link is missing, is not a symlink, or points somewhere
/// that does not look like `.../objects/<key>/<file>`.
#[must_use]
pub fn current_target(link: &Path) -> Option<CacheKey> {
    let metadata = std::fs::symlink_metadata(link).ok()?;
    if !metadata.file_type().is_symlink() {
        return None;
    }

    let target = std::fs::read_link(link).ok()?;
    let target = if target.is_absolute() {
        target
    } else {
        link_dir(link).join(target)
    };
    let target = normalize_path(&target);

    let mut components = target.components().rev();
    let _file = normal(components.next()?)?;
    let key = normal(components.next()?)?;
    let objects = normal(components.next()?)?;
    if objects != OBJECTS_DIR {
        return None;
    }
    CacheKey::parse(&key)
}

/// Point `link` at `object`, replacing whatever is there.
///
/// The link target is written relative to the link's directory unless that
/// would climb more than one level, in which case it is absolute. When the
/// link already has exactly that target nothing is touched.
pub fn redirect(link: &Path, object: &Path) -> Result<RedirectOutcome, DuckError> {
    let link_error = |reason: String| DuckError::Link {
        path: link.display().to_string(),
        reason,
    };

    let preferred = preferred_target(link, object).map_err(|e| link_error(e.to_string()))?;

    if std::fs::read_link(link).is_ok_and(|current| current == preferred) {
        tracing::debug!("Link {} already points at {}", link.display(), preferred.display());
        return Ok(RedirectOutcome::Unchanged);
    }

    if let Ok(metadata) = std::fs::symlink_metadata(link) {
        if metadata.is_dir() {
            return Err(link_error("a directory exists at the link path".to_string()));
        }
    }

    let dir = link_dir(link);
    ensure_dir(&dir).map_err(|e| link_error(format!("{e:#}")))?;

    replace_link(link, &preferred).map_err(|e| link_error(e.to_string()))?;
    tracing::info!("Linked {} -> {}", link.display(), preferred.display());
    Ok(RedirectOutcome::Updated)
}

fn normal(component: Component<'_>) -> Option<String> {
    match component {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

fn link_dir(link: &Path) -> PathBuf {
    match link.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn preferred_target(link: &Path, object: &Path) -> io::Result<PathBuf> {
    let dir = normalize_path(&std::path::absolute(link_dir(link))?);
    let object = normalize_path(&std::path::absolute(object)?);

    match relative_path(&dir, &object) {
        Some(relative) if climbs(&relative) <= 1 => Ok(relative),
        _ => Ok(object),
    }
}

fn climbs(path: &Path) -> usize {
    path.components()
        .take_while(|c| matches!(c, Component::ParentDir))
        .count()
}

#[cfg(unix)]
fn replace_link(link: &Path, target: &Path) -> io::Result<()> {
    let name = link.file_name().map_or_else(
        || "link".to_string(),
        |n| n.to_string_lossy().into_owned(),
    );
    let temp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .make_in(link_dir(link), |path| std::os::unix::fs::symlink(target, path))?;

    // rename(2) swaps the entry in one step, so readers never see a missing link
    temp.into_temp_path().persist(link)?;
    Ok(())
}

#[cfg(windows)]
fn replace_link(link: &Path, target: &Path) -> io::Result<()> {
    match std::fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::windows::fs::symlink_file(target, link)
}
