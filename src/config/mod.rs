//! Configuration for duck
//!
//! `duck.yaml` declares one implicit `default` target and any number of named
//! targets. Each target names a binary, how the rendered file is passed to it,
//! the remote template and the variables used to render it.
//!
//! ```yaml
//! version: 1
//! default:
//!   binary: make
//!   fileFlag: -f
//!   template:
//!     repo: https://example.com/templates.git
//!     ref: v1.2.0
//!     path: make/Makefile.tpl
//!   variables:
//!     PROJECT: demo
//!     USER: !env USER
//! targets:
//!   lint:
//!     binary: golangci-lint
//!     fileFlag: --config
//!     template:
//!       repo: https://example.com/templates.git
//!       path: lint/golangci.yml.tpl
//! ```
//!
//! The file is looked up in the working directory as `duck.yaml`,
//! `duck.yml`, `.duck.yaml` or `.duck.yml` (first match wins) unless an
//! explicit path is given. Loading validates every target, so the rest of the
//! crate only ever sees usable records.
//!
//! Process-level knobs (cache root and timeouts) live in [`RuntimeSettings`].

mod settings;
mod target;
mod variable;

pub use settings::RuntimeSettings;
pub use target::{DelimiterOverride, Target, TemplateSpec};
pub use variable::{Scalar, VariableBinding};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_FILE_NAMES, DEFAULT_TARGET, FETCH_WORKDIR, OBJECTS_DIR};
use crate::core::DuckError;

/// Minimum similarity (percent) for a target name to be suggested.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Parsed and validated `duck.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DuckConfig {
    /// Schema version. Only `1` exists.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Target used when none is named on the command line.
    #[serde(default)]
    pub default: Option<Target>,

    /// Named targets.
    #[serde(default)]
    pub targets: BTreeMap<String, Target>,
}

const fn default_version() -> u32 {
    1
}

impl DuckConfig {
    /// Find the config file in `dir`.
    pub fn discover(dir: &Path) -> Result<PathBuf, DuckError> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| DuckError::ConfigNotFound {
                tried: CONFIG_FILE_NAMES.iter().map(ToString::to_string).collect(),
            })
    }

    /// Read, parse and validate a config file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&content, &path.display().to_string())?;
        tracing::debug!(
            "Loaded {} with {} named target(s)",
            path.display(),
            config.targets.len()
        );
        Ok(config)
    }

    /// Parse and validate YAML text. `file` only labels errors.
    pub fn from_yaml_str(content: &str, file: &str) -> Result<Self, DuckError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| DuckError::ConfigParse {
            file: file.to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every target for required fields and usable names.
    pub fn validate(&self) -> Result<(), DuckError> {
        if self.version != 1 {
            return Err(DuckError::ConfigValidation {
                reason: format!("unsupported config version {} (expected 1)", self.version),
            });
        }
        if self.default.is_none() && self.targets.is_empty() {
            return Err(DuckError::ConfigValidation {
                reason: "no targets defined (add a `default:` target or a `targets:` map)"
                    .to_string(),
            });
        }

        if let Some(target) = &self.default {
            validate_target(DEFAULT_TARGET, target)?;
        }
        for (name, target) in &self.targets {
            validate_target_name(name)?;
            validate_target(name, target)?;
        }
        Ok(())
    }

    /// Whether `name` is a named target (the default target does not count).
    #[must_use]
    pub fn has_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    /// Select a target. Empty or `default` selects the default target.
    pub fn target(&self, name: &str) -> Result<(&str, &Target), DuckError> {
        if name.is_empty() || name == DEFAULT_TARGET {
            return self
                .default
                .as_ref()
                .map(|t| (DEFAULT_TARGET, t))
                .ok_or_else(|| DuckError::UnknownTarget {
                    name: DEFAULT_TARGET.to_string(),
                    suggestions: self.targets.keys().cloned().collect(),
                });
        }

        self.targets
            .get_key_value(name)
            .map(|(k, t)| (k.as_str(), t))
            .ok_or_else(|| DuckError::UnknownTarget {
                name: name.to_string(),
                suggestions: self.suggest(name),
            })
    }

    /// All targets, default first, then named targets in sorted order.
    pub fn iter_targets(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.default
            .iter()
            .map(|t| (DEFAULT_TARGET, t))
            .chain(self.targets.iter().map(|(k, t)| (k.as_str(), t)))
    }

    fn suggest(&self, name: &str) -> Vec<String> {
        self.iter_targets()
            .map(|(candidate, _)| candidate)
            .filter(|candidate| {
                let distance = strsim::levenshtein(name, candidate);
                let longest = name.len().max(candidate.len()).max(1);
                (longest - distance.min(longest)) * 100 / longest >= SIMILARITY_THRESHOLD_PERCENT
            })
            .map(ToString::to_string)
            .collect()
    }
}

fn validate_target_name(name: &str) -> Result<(), DuckError> {
    let reason = if name.trim().is_empty() {
        Some("target names must not be empty".to_string())
    } else if name == OBJECTS_DIR {
        Some(format!("target name '{OBJECTS_DIR}' is reserved by the cache layout"))
    } else if name == DEFAULT_TARGET {
        Some("define the default target under the top-level `default:` key".to_string())
    } else if name == "." || name == ".." || name.contains(['/', '\\']) {
        Some(format!("target name '{name}' must not contain path separators"))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(DuckError::ConfigValidation { reason }),
        None => Ok(()),
    }
}

fn validate_target(name: &str, target: &Target) -> Result<(), DuckError> {
    let missing = |field: &str| DuckError::ConfigValidation {
        reason: format!("target '{name}' is missing `{field}`"),
    };

    if target.binary.trim().is_empty() {
        return Err(missing("binary"));
    }
    if target.template.repo.trim().is_empty() {
        return Err(missing("template.repo"));
    }
    if target.template.path.trim().is_empty() {
        return Err(missing("template.path"));
    }

    for var in target.variables.keys() {
        if !is_identifier(var) {
            return Err(DuckError::ConfigValidation {
                reason: format!(
                    "target '{name}': variable name '{var}' must start with a letter or '_' and contain only letters, digits and '_'"
                ),
            });
        }
    }

    if let Some(rendered) = &target.rendered_name {
        if rendered.contains(['/', '\\']) {
            return Err(DuckError::ConfigValidation {
                reason: format!("target '{name}': renderedName must be a file name, not a path"),
            });
        }
    }

    // The default link shares the per-target directory with the git checkout
    let custom_link = target.rendered_path.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
    if !custom_link && target.basename() == FETCH_WORKDIR {
        return Err(DuckError::ConfigValidation {
            reason: format!(
                "target '{name}': rendered file name '{FETCH_WORKDIR}' is reserved for the template checkout; set renderedName or renderedPath"
            ),
        });
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
