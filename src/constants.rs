//! Global constants used throughout the duck codebase.
//!
//! File names, cache layout segments and environment variable names live here so
//! the on-disk layout is defined in exactly one place.

use std::time::Duration;

/// Config file names probed in the working directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["duck.yaml", "duck.yml", ".duck.yaml", ".duck.yml"];

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".duck";

/// Directory under the cache root holding content objects (`objects/<key>/<basename>`).
///
/// Also reserved as a target name, since per-target directories share the cache root.
pub const OBJECTS_DIR: &str = "objects";

/// Directory under a per-target cache directory where the git fetcher keeps its checkout.
pub const FETCH_WORKDIR: &str = "repo";

/// Name of the implicit target selected when no target is given on the command line.
pub const DEFAULT_TARGET: &str = "default";

/// Ref used when a template descriptor leaves `ref` empty.
pub const DEFAULT_REF: &str = "HEAD";

/// Suffix stripped from the template path to form the rendered basename.
pub const TEMPLATE_SUFFIX: &str = ".tpl";

/// Default template delimiters.
pub const DEFAULT_OPEN_DELIMITER: &str = "{{";
/// Default template delimiters.
pub const DEFAULT_CLOSE_DELIMITER: &str = "}}";

/// Shell used for `!cmd` variables.
pub const POSIX_SHELL: &str = "/bin/sh";

/// Overrides the cache root (same as `--cache-dir`).
pub const ENV_CACHE_DIR: &str = "DUCK_CACHE_DIR";

/// Timeout in seconds for each `!cmd` variable. Unset means wait forever.
pub const ENV_COMMAND_TIMEOUT: &str = "DUCK_COMMAND_TIMEOUT";

/// Timeout in seconds for each git operation of the fetcher. Unset means the default below.
pub const ENV_FETCH_TIMEOUT: &str = "DUCK_FETCH_TIMEOUT";

/// Timeout for a single git operation when `DUCK_FETCH_TIMEOUT` is not set (5 minutes).
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Hex length of a cache key (SHA-256).
pub const CACHE_KEY_LEN: usize = 64;
