//! Render failures.
//!
//! Parsing and execution are separate variants so the CLI can point at the
//! template text in one case and at the data in the other.

use thiserror::Error;

/// A template could not be turned into bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The template text is not valid.
    #[error("Template syntax error in {template}{}: {message}", line_suffix(*line))]
    Parse {
        /// Template name (rendered basename)
        template: String,
        /// Cleaned-up parser message
        message: String,
        /// 1-based line, when known
        line: Option<usize>,
    },

    /// Strict mode met a variable with no value.
    #[error("Template variable not found: '{variable}'")]
    MissingVariable {
        /// Name as referenced in the template
        variable: String,
        /// Close matches among the declared variables
        suggestions: Vec<String>,
        /// First line that mentions it, when found
        line: Option<usize>,
    },

    /// The template parsed but failed while running (bad filter input, etc.).
    #[error("Failed to render {template}: {message}")]
    Execute {
        /// Template name (rendered basename)
        template: String,
        /// Cleaned-up engine message
        message: String,
    },
}

fn line_suffix(line: Option<usize>) -> String {
    line.map(|l| format!(" (line {l})")).unwrap_or_default()
}

impl RenderError {
    /// Multi-line explanation for the CLI's details section.
    #[must_use]
    pub fn format_with_context(&self) -> String {
        match self {
            Self::Parse { message, line, .. } => {
                let mut msg = message.clone();
                if let Some(line) = line {
                    msg.push_str(&format!("\nLine: {line}"));
                }
                msg
            }
            Self::MissingVariable {
                variable,
                suggestions,
                line,
            } => {
                let mut msg = format!("Variable: {variable}\n");
                if let Some(line) = line {
                    msg.push_str(&format!("Line: {line}\n"));
                }
                if !suggestions.is_empty() {
                    msg.push_str("Did you mean one of these?\n");
                    for suggestion in suggestions {
                        msg.push_str(&format!("  - {suggestion}\n"));
                    }
                }
                msg.trim_end().to_string()
            }
            Self::Execute { message, .. } => message.clone(),
        }
    }
}
