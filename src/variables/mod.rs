//! Variable resolution.
//!
//! Turns the bindings declared on a target into concrete values, once per
//! invocation and before anything is fetched or rendered. Nothing here is
//! cached: `!cmd` commands run and `!file` files are read on every run.
//!
//! | Binding       | Result                                   | Failure        |
//! |---------------|------------------------------------------|----------------|
//! | literal       | the value, unchanged                     | never          |
//! | `!env NAME`   | the variable, or `""` when unset         | never          |
//! | `!file PATH`  | whole file as text                       | IO error       |
//! | `!cmd EXPR`   | stdout of `/bin/sh -c EXPR`, trailing `\r`/`\n` trimmed | non-zero exit, spawn failure, timeout |
//!
//! Bindings are resolved one at a time in name order, so when several would
//! fail the reported one is always the same.

mod environment;

pub use environment::{Environment, MapEnvironment, ProcessEnvironment};

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::{Scalar, VariableBinding};
use crate::constants::POSIX_SHELL;
use crate::core::DuckError;

/// Why a single binding could not be resolved.
#[derive(Debug, Error)]
pub enum VariableFailure {
    /// `!file` could not be read
    #[error("cannot read file {}", path.display())]
    ReadFile {
        /// Path as resolved against the working directory
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// `!cmd` exited unsuccessfully
    #[error("command `{command}` failed with {status}")]
    CommandFailed {
        /// Shell expression
        command: String,
        /// Exit status description
        status: String,
        /// Captured stderr
        stderr: String,
    },

    /// `!cmd` could not be started
    #[error("cannot run command `{command}`")]
    CommandSpawn {
        /// Shell expression
        command: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// `!cmd` did not finish in time
    #[error("command `{command}` timed out after {seconds}s")]
    CommandTimeout {
        /// Shell expression
        command: String,
        /// Configured limit
        seconds: u64,
    },
}

impl VariableFailure {
    /// Extra text for error display: stderr for failed commands, the OS error
    /// otherwise.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::ReadFile { source, .. } | Self::CommandSpawn { source, .. } => source.to_string(),
            Self::CommandFailed { stderr, .. } => {
                let trimmed = stderr.trim();
                if trimmed.is_empty() {
                    "(no output on stderr)".to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Self::CommandTimeout { seconds, .. } => {
                format!("raise DUCK_COMMAND_TIMEOUT (currently {seconds}s) or set it to 0")
            }
        }
    }
}

/// Concrete variable values for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedVariables(BTreeMap<String, Scalar>);

impl ResolvedVariables {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: Scalar) {
        self.0.insert(name.into(), value);
    }

    /// Value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.0.get(name)
    }

    /// Whether `name` has a value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Scalar)> for ResolvedVariables {
    fn from_iter<T: IntoIterator<Item = (K, Scalar)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Resolves a target's bindings against an [`Environment`].
#[derive(Clone)]
pub struct VariableResolver {
    env: Arc<dyn Environment>,
    working_dir: PathBuf,
    command_timeout: Option<Duration>,
}

impl VariableResolver {
    /// Resolver reading `env`, relative to the current directory, without a
    /// command timeout.
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self {
            env,
            working_dir: PathBuf::from("."),
            command_timeout: None,
        }
    }

    /// Directory that relative `!file` paths and `!cmd` commands run in.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Limit for each `!cmd`.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Resolve every binding, stopping at the first failure.
    pub async fn resolve(
        &self,
        bindings: &BTreeMap<String, VariableBinding>,
    ) -> Result<ResolvedVariables, DuckError> {
        let mut resolved = ResolvedVariables::new();
        for (name, binding) in bindings {
            let value = self.resolve_one(binding).await.map_err(|cause| {
                DuckError::VariableResolution {
                    name: name.clone(),
                    cause,
                }
            })?;
            tracing::debug!("Resolved variable {} ({})", name, binding.origin());
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    async fn resolve_one(&self, binding: &VariableBinding) -> Result<Scalar, VariableFailure> {
        match binding {
            VariableBinding::Literal(value) => Ok(value.clone()),
            VariableBinding::EnvRef(name) => {
                Ok(self.env.var(name).map_or_else(Scalar::empty, Scalar::String))
            }
            VariableBinding::FileRef(path) => self.read_file(Path::new(path)).await,
            VariableBinding::CommandRef(command) => self.run_command(command).await,
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Scalar, VariableFailure> {
        let full = self.working_dir.join(path);
        let bytes = tokio::fs::read(&full).await.map_err(|source| VariableFailure::ReadFile {
            path: full.clone(),
            source,
        })?;
        Ok(Scalar::String(String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn run_command(&self, command: &str) -> Result<Scalar, VariableFailure> {
        tracing::debug!("Running variable command: {} -c {}", POSIX_SHELL, command);

        let mut cmd = Command::new(POSIX_SHELL);
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .env_clear()
            .envs(self.env.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.command_timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output()).await.map_err(|_| {
                VariableFailure::CommandTimeout {
                    command: command.to_string(),
                    seconds: limit.as_secs(),
                }
            })?,
            None => cmd.output().await,
        }
        .map_err(|source| VariableFailure::CommandSpawn {
            command: command.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(VariableFailure::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Scalar::String(stdout.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(env: MapEnvironment) -> VariableResolver {
        VariableResolver::new(Arc::new(env))
    }

    fn bindings(pairs: &[(&str, VariableBinding)]) -> BTreeMap<String, VariableBinding> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_literal_and_env() {
        let env = MapEnvironment::from_pairs([("ENV1", "hello")]);
        let vars = resolver(env)
            .resolve(&bindings(&[
                ("A", VariableBinding::Literal(Scalar::Integer(3))),
                ("B", VariableBinding::EnvRef("ENV1".into())),
                ("C", VariableBinding::EnvRef("UNSET_VAR".into())),
            ]))
            .await
            .unwrap();
        assert_eq!(vars.get("A"), Some(&Scalar::Integer(3)));
        assert_eq!(vars.get("B"), Some(&Scalar::from("hello")));
        assert_eq!(vars.get("C"), Some(&Scalar::from("")));
    }

    #[tokio::test]
    async fn test_file_ref_reads_whole_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("LICENSE"), "MIT\nline two\n").unwrap();
        let vars = resolver(MapEnvironment::default())
            .with_working_dir(dir.path())
            .resolve(&bindings(&[("LIC", VariableBinding::FileRef("LICENSE".into()))]))
            .await
            .unwrap();
        assert_eq!(vars.get("LIC"), Some(&Scalar::from("MIT\nline two\n")));
    }

    #[tokio::test]
    async fn test_file_ref_missing_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = resolver(MapEnvironment::default())
            .with_working_dir(dir.path())
            .resolve(&bindings(&[("LIC", VariableBinding::FileRef("nope".into()))]))
            .await
            .unwrap_err();
        match err {
            DuckError::VariableResolution { name, cause } => {
                assert_eq!(name, "LIC");
                assert!(matches!(cause, VariableFailure::ReadFile { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_trims_trailing_newlines_only() {
        let vars = resolver(MapEnvironment::default())
            .resolve(&bindings(&[(
                "X",
                VariableBinding::CommandRef("printf '  a b\\r\\n\\n'".into()),
            )]))
            .await
            .unwrap();
        assert_eq!(vars.get("X"), Some(&Scalar::from("  a b")));
    }

    #[tokio::test]
    async fn test_command_sees_capability_environment() {
        let env = MapEnvironment::from_pairs([("GREETING", "hi")]);
        let vars = resolver(env)
            .resolve(&bindings(&[(
                "X",
                VariableBinding::CommandRef("echo \"$GREETING there\"".into()),
            )]))
            .await
            .unwrap();
        assert_eq!(vars.get("X"), Some(&Scalar::from("hi there")));
    }

    #[tokio::test]
    async fn test_command_failure_carries_stderr() {
        let err = resolver(MapEnvironment::default())
            .resolve(&bindings(&[(
                "BAD",
                VariableBinding::CommandRef("echo oops >&2; exit 3".into()),
            )]))
            .await
            .unwrap_err();
        match err {
            DuckError::VariableResolution { name, cause } => {
                assert_eq!(name, "BAD");
                assert!(cause.details().contains("oops"));
                assert!(matches!(cause, VariableFailure::CommandFailed { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let env = MapEnvironment::from_pairs([("PATH", std::env::var("PATH").unwrap())]);
        let err = resolver(env)
            .with_command_timeout(Some(Duration::from_millis(200)))
            .resolve(&bindings(&[("SLOW", VariableBinding::CommandRef("sleep 5".into()))]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DuckError::VariableResolution {
                cause: VariableFailure::CommandTimeout { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_first_failure_in_name_order() {
        let err = resolver(MapEnvironment::default())
            .resolve(&bindings(&[
                ("Z", VariableBinding::CommandRef("exit 1".into())),
                ("A", VariableBinding::FileRef("/definitely/missing".into())),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, DuckError::VariableResolution { ref name, .. } if name == "A"));
    }
}
