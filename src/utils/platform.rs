//! Platform-specific helpers.

/// Whether duck is running on Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Name of the git executable for this platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() { "git.exe" } else { "git" }
}

/// Whether `cmd` can be found on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}
