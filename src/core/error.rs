//! Error handling for duck
//!
//! Two layers, same as the rest of the codebase:
//! 1. [`DuckError`] is the strongly-typed error every pipeline stage returns.
//! 2. [`ErrorContext`] wraps it with details and an actionable suggestion for
//!    the CLI, built by [`user_friendly_error`].
//!
//! # Error Categories
//!
//! - **Variables**: [`DuckError::VariableResolution`]
//! - **Fetch**: [`DuckError::Fetch`], [`DuckError::GitNotFound`], [`DuckError::GitCommandError`]
//! - **Render**: [`DuckError::Render`]
//! - **Link**: [`DuckError::Link`]
//! - **Execution**: [`DuckError::Execution`], [`DuckError::ChildExited`]
//! - **Configuration**: [`DuckError::ConfigNotFound`], [`DuckError::ConfigParse`],
//!   [`DuckError::ConfigValidation`], [`DuckError::UnknownTarget`]

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::templating::RenderError;
use crate::variables::VariableFailure;

/// The main error type for duck operations.
///
/// Each stage of the pipeline fails fast with one of these; nothing retries.
#[derive(Error, Debug)]
pub enum DuckError {
    /// A variable binding could not be resolved.
    ///
    /// Only `!file` and `!cmd` bindings fail; `!env` falls back to an empty string.
    #[error("Failed to resolve variable '{name}': {cause}")]
    VariableResolution {
        /// Variable name as declared in the target
        name: String,
        /// What went wrong
        #[source]
        cause: VariableFailure,
    },

    /// The fetch capability could not materialize the template source.
    #[error("Failed to fetch template source {repo}@{reference}")]
    Fetch {
        /// Source identity (repository URL or path)
        repo: String,
        /// Requested ref
        reference: String,
        /// Underlying fetcher error, passed through untouched
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Template parsing or execution failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The stable link could not be redirected.
    #[error("Failed to update stable link {path}: {reason}")]
    Link {
        /// Link path
        path: String,
        /// Filesystem error description
        reason: String,
    },

    /// The wrapped binary could not be started.
    #[error("Failed to execute '{binary}': {reason}")]
    Execution {
        /// Binary as declared in the target
        binary: String,
        /// Spawn failure description
        reason: String,
    },

    /// The wrapped binary ran and exited unsuccessfully.
    ///
    /// The CLI passes `code` through as its own exit status.
    #[error("'{binary}' exited with status {code}")]
    ChildExited {
        /// Binary as declared in the target
        binary: String,
        /// Exit code (128 + signal number when killed by a signal)
        code: i32,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git command returned a non-zero exit code or timed out
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "clone", "fetch", "checkout")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Shallow clone of the template repository failed
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// The repository URL that failed to clone
        url: String,
        /// The reason for the clone failure
        reason: String,
    },

    /// Checking out the fetched ref failed
    #[error("Failed to checkout reference '{reference}'")]
    GitCheckoutFailed {
        /// The ref that failed to check out
        reference: String,
        /// The reason for the checkout failure
        reason: String,
    },

    /// No config file in the working directory
    #[error("No config file found (tried: {})", tried.join(", "))]
    ConfigNotFound {
        /// File names that were probed
        tried: Vec<String>,
    },

    /// Config file is not valid YAML or does not match the schema
    #[error("Invalid config file syntax in {file}: {reason}")]
    ConfigParse {
        /// Config file path
        file: String,
        /// Parser message
        reason: String,
    },

    /// Config file parsed but a target is unusable
    #[error("Config validation failed: {reason}")]
    ConfigValidation {
        /// What is wrong
        reason: String,
    },

    /// The requested target is not defined
    #[error("Unknown target '{name}'")]
    UnknownTarget {
        /// Requested name
        name: String,
        /// Close matches among defined targets
        suggestions: Vec<String>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show the main message in red, optional details in
/// yellow and an optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The main error message
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with just a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`DuckError`] anywhere under added `anyhow` context and tailors
/// the suggestion to the failing stage; everything else is shown with its
/// cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = format_chain(&error);

    if let Some(duck_error) = error.downcast_ref::<DuckError>() {
        let ctx = create_error_context(duck_error);
        // Keep the outer anyhow context in front when there is one
        let top = error.to_string();
        if top != duck_error.to_string() {
            return ErrorContext {
                message: format!("{top}: {}", ctx.message),
                ..ctx
            };
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(chain)
                .with_suggestion("Check permissions on the cache directory and the config file");
        }
    }

    ErrorContext::new(chain)
}

fn format_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !causes.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in causes.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}

fn format_source_chain(error: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    if causes.is_empty() {
        None
    } else {
        Some(causes.join("\n  → "))
    }
}

fn create_error_context(error: &DuckError) -> ErrorContext {
    let base = ErrorContext::new(error.to_string());
    match error {
        DuckError::VariableResolution { cause, .. } => base
            .with_details(cause.details())
            .with_suggestion("Fix the variable's source (file path or shell command) in the config and try again"),

        DuckError::Fetch { repo, .. } => {
            let details = format_source_chain(error).unwrap_or_default();
            base.with_details(details).with_suggestion(format!(
                "Check that {repo} is reachable and that the ref exists. Run with --verbose to see the git commands"
            ))
        }

        DuckError::Render(render) => base
            .with_details(render.format_with_context())
            .with_suggestion(match render {
                RenderError::MissingVariable { .. } => {
                    "Declare the variable under `variables:` or set `missingKey: zero` on the template"
                }
                RenderError::Parse { .. } => {
                    "Check the template syntax and the configured delimiters"
                }
                RenderError::Execute { .. } => {
                    "Check the filters and functions used by the template"
                }
            }),

        DuckError::Link { .. } => base
            .with_suggestion("Make sure the link location is writable and is not a directory"),

        DuckError::Execution { binary, .. } => base.with_suggestion(format!(
            "Install '{binary}' or fix the `binary` field of the target"
        )),

        DuckError::ChildExited { .. } => base,

        DuckError::GitNotFound => base
            .with_suggestion("Install git from https://git-scm.com/ or your package manager (e.g., 'brew install git', 'apt install git')")
            .with_details("duck uses the system git executable to fetch templates"),

        DuckError::GitCommandError { operation, stderr } => base
            .with_details(stderr.trim().to_string())
            .with_suggestion(match operation.as_str() {
                op if op.contains("clone") => "Check the repository URL and your access to it",
                op if op.contains("fetch") => "Check that the ref (branch, tag or commit) exists on the remote",
                op if op.contains("checkout") => "Verify the fetched ref can be checked out",
                _ => "Try running the git command manually for more details",
            }),

        DuckError::GitCloneFailed { reason, .. } => base
            .with_details(reason.trim().to_string())
            .with_suggestion("Check the repository URL, your network connection and your credentials"),

        DuckError::GitCheckoutFailed { reason, .. } => base
            .with_details(reason.trim().to_string())
            .with_suggestion("Check that the ref exists on the remote (branch, tag or full commit hash)"),

        DuckError::ConfigNotFound { .. } => base
            .with_suggestion("Create a duck.yaml in the current directory or pass --config <PATH>"),

        DuckError::ConfigParse { .. } => base.with_suggestion(
            "Check the YAML syntax. Variable tags are !env NAME, !cmd 'command' and !file path",
        ),

        DuckError::ConfigValidation { .. } => base,

        DuckError::UnknownTarget { suggestions, .. } => {
            if suggestions.is_empty() {
                base.with_suggestion("Run 'duck list' to see the defined targets")
            } else {
                base.with_suggestion(format!("Did you mean: {}?", suggestions.join(", ")))
            }
        }

        DuckError::Io(_) => base,
    }
}
