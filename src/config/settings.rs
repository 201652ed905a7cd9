//! Process-level settings that do not belong in `duck.yaml`.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_GIT_TIMEOUT, ENV_CACHE_DIR, ENV_COMMAND_TIMEOUT, ENV_FETCH_TIMEOUT,
};
use crate::core::DuckError;
use crate::variables::Environment;

/// Settings read once at startup and injected into the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Cache root holding `objects/` and per-target directories.
    pub cache_dir: PathBuf,
    /// Limit for each `!cmd` variable. `None` waits forever.
    pub command_timeout: Option<Duration>,
    /// Limit for each git operation. `None` waits forever.
    pub fetch_timeout: Option<Duration>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            command_timeout: None,
            fetch_timeout: Some(DEFAULT_GIT_TIMEOUT),
        }
    }
}

impl RuntimeSettings {
    /// Read `DUCK_CACHE_DIR`, `DUCK_COMMAND_TIMEOUT` and `DUCK_FETCH_TIMEOUT`.
    ///
    /// Timeouts are whole seconds; `0` disables the limit.
    pub fn from_environment(env: &dyn Environment) -> Result<Self, DuckError> {
        let mut settings = Self::default();

        if let Some(dir) = env.var(ENV_CACHE_DIR).filter(|d| !d.trim().is_empty()) {
            settings.cache_dir = PathBuf::from(dir);
        }
        if let Some(raw) = env.var(ENV_COMMAND_TIMEOUT) {
            settings.command_timeout = parse_timeout(ENV_COMMAND_TIMEOUT, &raw)?;
        }
        if let Some(raw) = env.var(ENV_FETCH_TIMEOUT) {
            settings.fetch_timeout = parse_timeout(ENV_FETCH_TIMEOUT, &raw)?;
        }

        Ok(settings)
    }

    /// Replace the cache root (from `--cache-dir`).
    #[must_use]
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.cache_dir = dir;
        }
        self
    }
}

fn parse_timeout(name: &str, raw: &str) -> Result<Option<Duration>, DuckError> {
    let seconds: u64 = raw.trim().parse().map_err(|_| DuckError::ConfigValidation {
        reason: format!("{name} must be a whole number of seconds, got '{raw}'"),
    })?;
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}
