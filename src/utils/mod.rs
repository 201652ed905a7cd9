//! Cross-platform utilities and helpers
//!
//! - [`fs`]: directory creation, atomic writes, path normalization, disk usage
//! - [`platform`]: executable lookup

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, ensure_dir, normalize_path};
pub use platform::{command_exists, get_git_command, is_windows};
