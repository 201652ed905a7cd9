//! Target records and their template descriptors.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::VariableBinding;
use crate::constants::{
    DEFAULT_CLOSE_DELIMITER, DEFAULT_OPEN_DELIMITER, DEFAULT_REF, TEMPLATE_SUFFIX,
};
use crate::templating::{Delimiters, MissingKeyPolicy};

/// One template-to-binary wrapping.
///
/// Read-only for the whole invocation. Field names follow the camelCase
/// spelling used in `duck.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Executable to run, looked up on `PATH`.
    #[serde(default)]
    pub binary: String,

    /// Flag placed before the rendered file path (e.g. `-f`). Empty means the
    /// path is passed as a bare positional argument.
    #[serde(default)]
    pub file_flag: String,

    /// Arguments always passed after the file path.
    #[serde(default)]
    pub args: Vec<String>,

    /// Free text shown by `duck list`.
    #[serde(default)]
    pub description: String,

    /// Where the template comes from and how to render it.
    #[serde(default)]
    pub template: TemplateSpec,

    /// Variable bindings, keyed by template variable name.
    #[serde(default)]
    pub variables: BTreeMap<String, VariableBinding>,

    /// Overrides the stable link location (`<cacheRoot>/<target>/<basename>` otherwise).
    #[serde(default, alias = "cacheFile")]
    pub rendered_path: Option<PathBuf>,

    /// Overrides the rendered file name.
    #[serde(default)]
    pub rendered_name: Option<String>,
}

impl Target {
    /// File name used for both the content object and the default link.
    ///
    /// `renderedName` when set, else the last component of the template path
    /// with a trailing `.tpl` removed.
    #[must_use]
    pub fn basename(&self) -> String {
        if let Some(name) = self.rendered_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let file_name = self
            .template
            .path
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(self.template.path.as_str());

        match file_name.strip_suffix(TEMPLATE_SUFFIX) {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => file_name.to_string(),
        }
    }
}

/// Remote template descriptor.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    /// Source identity handed to the fetcher (git URL or local path).
    #[serde(default)]
    pub repo: String,

    /// Revision to fetch. Empty means `HEAD`.
    #[serde(default, rename = "ref")]
    pub git_ref: String,

    /// Path of the template inside the fetched tree.
    #[serde(default)]
    pub path: String,

    /// Optional delimiter override.
    #[serde(default)]
    pub delims: Option<DelimiterOverride>,

    /// `strict` (default) or `zero`.
    #[serde(default)]
    pub missing_key: Option<MissingKeyPolicy>,

    /// Legacy spelling of `missingKey: zero`.
    #[serde(default)]
    pub allow_missing: bool,
}

/// Raw `delims:` block.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DelimiterOverride {
    /// Opening token
    #[serde(default)]
    pub left: String,
    /// Closing token
    #[serde(default)]
    pub right: String,
}

impl TemplateSpec {
    /// Ref to fetch, defaulting to `HEAD`.
    #[must_use]
    pub fn effective_ref(&self) -> &str {
        let trimmed = self.git_ref.trim();
        if trimmed.is_empty() { DEFAULT_REF } else { trimmed }
    }

    /// Delimiters to render with. Each side independently falls back to the
    /// default when the override is empty or whitespace.
    #[must_use]
    pub fn delimiters(&self) -> Delimiters {
        let pick = |value: Option<&str>, fallback: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        let delims = self.delims.as_ref();
        Delimiters {
            open: pick(delims.map(|d| d.left.as_str()), DEFAULT_OPEN_DELIMITER),
            close: pick(delims.map(|d| d.right.as_str()), DEFAULT_CLOSE_DELIMITER),
        }
    }

    /// Effective missing-key policy. An explicit `missingKey` wins over
    /// `allowMissing`.
    #[must_use]
    pub fn missing_key_policy(&self) -> MissingKeyPolicy {
        match self.missing_key {
            Some(policy) => policy,
            None if self.allow_missing => MissingKeyPolicy::Zero,
            None => MissingKeyPolicy::Strict,
        }
    }
}
