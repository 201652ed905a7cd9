//! Template rendering with Tera.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use strsim::levenshtein;
use tera::{Context as TeraContext, Tera};

use super::error::RenderError;
use super::functions::{self, Clock};
use super::syntax::{TagSet, translate};
use crate::constants::{DEFAULT_CLOSE_DELIMITER, DEFAULT_OPEN_DELIMITER};
use crate::variables::{Environment, ResolvedVariables};

/// Maximum distance (as a percentage of the name length) for a suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Open/close tokens for expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    /// Opening token, `{{` by default
    pub open: String,
    /// Closing token, `}}` by default
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN_DELIMITER.to_string(),
            close: DEFAULT_CLOSE_DELIMITER.to_string(),
        }
    }
}

/// What to do with a variable the template reads but nobody defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKeyPolicy {
    /// Fail, naming the variable.
    #[default]
    Strict,
    /// Render it as an empty string.
    Zero,
}

/// Per-template render settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Name used in error messages
    pub template_name: String,
    /// Tag tokens
    pub delimiters: Delimiters,
    /// Missing-variable handling
    pub missing_key: MissingKeyPolicy,
}

/// Renders template bytes against resolved variables.
///
/// A fresh `Tera` instance is built for every render; it only ever holds one
/// template, and output is never HTML-escaped.
#[derive(Clone)]
pub struct TemplateRenderer {
    env: Arc<dyn Environment>,
    clock: Clock,
}

impl TemplateRenderer {
    /// Renderer whose `env()` function reads `env` and whose `now()` reads
    /// the system clock.
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self {
            env,
            clock: functions::system_clock(),
        }
    }

    /// Replace the clock behind `now()`.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Render `source`.
    pub fn render(
        &self,
        source: &[u8],
        options: &RenderOptions,
        vars: &ResolvedVariables,
    ) -> Result<Vec<u8>, RenderError> {
        let name = options.template_name.as_str();
        let text = std::str::from_utf8(source).map_err(|e| RenderError::Parse {
            template: name.to_string(),
            message: format!("template is not valid UTF-8 ({e})"),
            line: None,
        })?;

        let translated = translate(text, &TagSet::new(&options.delimiters)).map_err(|unclosed| {
            RenderError::Parse {
                template: name.to_string(),
                message: format!("unclosed `{}` tag", unclosed.token),
                line: Some(unclosed.line),
            }
        })?;

        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        functions::register(&mut tera, Arc::clone(&self.env), Arc::clone(&self.clock));

        tera.add_raw_template(name, &translated.source).map_err(|e| RenderError::Parse {
            template: name.to_string(),
            message: format_tera_error(&e, name),
            line: extract_line(&e),
        })?;

        let mut context = TeraContext::new();
        for (key, value) in vars.iter() {
            context.insert(key, value);
        }
        match options.missing_key {
            MissingKeyPolicy::Zero => {
                for root in translated.roots.iter().filter(|r| !vars.contains(r)) {
                    tracing::debug!("Variable {} is not defined, rendering it empty", root);
                    context.insert(root.as_str(), "");
                }
            }
            MissingKeyPolicy::Strict => {
                // Tera reads an undefined name as falsy in tests and filters
                if let Some(missing) = first_missing(&translated.required, text, vars) {
                    return Err(missing_variable(missing, text, vars));
                }
            }
        }

        tracing::debug!(
            "Rendering {} with {} variable(s), delimiters {} {}",
            name,
            vars.len(),
            options.delimiters.open,
            options.delimiters.close
        );
        let rendered = tera
            .render(name, &context)
            .map_err(|e| classify_render_error(&e, name, text, vars))?;
        Ok(rendered.into_bytes())
    }
}

fn classify_render_error(
    error: &tera::Error,
    name: &str,
    source: &str,
    vars: &ResolvedVariables,
) -> RenderError {
    if let Some(variable) = error_chain(error).iter().find_map(|msg| extract_variable_name(msg)) {
        return missing_variable(variable, source, vars);
    }
    RenderError::Execute {
        template: name.to_string(),
        message: format_tera_error(error, name),
    }
}

/// Required name with no value, earliest in the source first.
fn first_missing(
    required: &BTreeSet<String>,
    source: &str,
    vars: &ResolvedVariables,
) -> Option<String> {
    required
        .iter()
        .filter(|name| !vars.contains(name))
        .min_by_key(|name| find_line(source, name).unwrap_or(usize::MAX))
        .cloned()
}

fn missing_variable(variable: String, source: &str, vars: &ResolvedVariables) -> RenderError {
    let root = variable.split('.').next().unwrap_or(&variable).to_string();
    let available: Vec<String> = vars.iter().map(|(k, _)| k.to_string()).collect();
    RenderError::MissingVariable {
        suggestions: find_similar_variables(&root, &available),
        line: find_line(source, &root),
        variable,
    }
}

fn error_chain(error: &tera::Error) -> Vec<String> {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }
    messages
}

/// Extract the name from "Variable `foo` not found".
fn extract_variable_name(message: &str) -> Option<String> {
    let re = Regex::new(r"Variable `([^`]+)` not found").ok()?;
    re.captures(message).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

fn find_similar_variables(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> = available
        .iter()
        .map(|var| (var.clone(), levenshtein(target, var)))
        .collect();
    scored.sort_by_key(|(_, dist)| *dist);

    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(var, _)| var)
        .collect()
}

fn find_line(source: &str, word: &str) -> Option<usize> {
    let re = Regex::new(&format!(r"\b{}\b", regex::escape(word))).ok()?;
    source.lines().position(|line| re.is_match(line)).map(|idx| idx + 1)
}

/// Line number from a Tera parse error (`--> 3:7`).
fn extract_line(error: &tera::Error) -> Option<usize> {
    let re = Regex::new(r"-->\s*(\d+):(\d+)").ok()?;
    error_chain(error).iter().find_map(|msg| {
        re.captures(msg)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
    })
}

/// Walk the error chain and drop Tera's wrapper lines that only repeat the
/// template name.
fn format_tera_error(error: &tera::Error, name: &str) -> String {
    let messages: Vec<String> = error_chain(error)
        .into_iter()
        .map(|msg| {
            msg.replace(&format!("while rendering '{name}'"), "")
                .replace(&format!("Failed to render '{name}'"), "")
                .replace(&format!("Failed to parse '{name}'"), "")
                .trim()
                .to_string()
        })
        .filter(|msg| !msg.is_empty())
        .collect();

    if messages.is_empty() {
        "template error".to_string()
    } else {
        messages.join("\n  → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scalar;
    use crate::variables::MapEnvironment;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(Arc::new(MapEnvironment::from_pairs([("SHELL_NAME", "zsh")])))
    }

    fn options(policy: MissingKeyPolicy) -> RenderOptions {
        RenderOptions {
            template_name: "Makefile".into(),
            delimiters: Delimiters::default(),
            missing_key: policy,
        }
    }

    fn vars(pairs: &[(&str, Scalar)]) -> ResolvedVariables {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn render_ok(source: &str, opts: &RenderOptions, v: &ResolvedVariables) -> String {
        String::from_utf8(renderer().render(source.as_bytes(), opts, v).unwrap()).unwrap()
    }

    #[test]
    fn test_literal_template_unchanged() {
        let source = "all:\n\t@echo hi\n";
        assert_eq!(
            render_ok(source, &options(MissingKeyPolicy::Strict), &ResolvedVariables::new()),
            source
        );
    }

    #[test]
    fn test_go_style_reference() {
        let v = vars(&[("ENV1", Scalar::from("hello"))]);
        assert_eq!(render_ok("value={{.ENV1}}", &options(MissingKeyPolicy::Strict), &v), "value=hello");
    }

    #[test]
    fn test_no_html_escaping() {
        let v = vars(&[("X", Scalar::from("<a & 'b'>"))]);
        let mut opts = options(MissingKeyPolicy::Strict);
        opts.template_name = "index.html".into();
        assert_eq!(render_ok("{{ X }}", &opts, &v), "<a & 'b'>");
    }

    #[test]
    fn test_scalar_types() {
        let v = vars(&[("N", Scalar::Integer(3)), ("B", Scalar::Bool(true))]);
        assert_eq!(
            render_ok("{{ N + 1 }}{% if B %} yes{% endif %}", &options(MissingKeyPolicy::Strict), &v),
            "4 yes"
        );
    }

    #[test]
    fn test_strict_missing_names_variable() {
        let v = vars(&[("NAME", Scalar::from("x"))]);
        let err = renderer()
            .render(b"line one\n{{ NAEM }}\n", &options(MissingKeyPolicy::Strict), &v)
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingVariable {
                variable: "NAEM".into(),
                suggestions: vec!["NAME".into()],
                line: Some(2),
            }
        );
    }

    #[test]
    fn test_strict_rejects_undefined_in_condition() {
        let err = renderer()
            .render(
                b"a{% if UNDEFINED %}x{% endif %}b",
                &options(MissingKeyPolicy::Strict),
                &ResolvedVariables::new(),
            )
            .unwrap_err();
        assert!(
            matches!(&err, RenderError::MissingVariable { variable, line: Some(1), .. } if variable == "UNDEFINED"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_strict_rejects_undefined_behind_default_filter() {
        let err = renderer()
            .render(
                b"{{ UNDEF | default(value=\"d\") }}",
                &options(MissingKeyPolicy::Strict),
                &ResolvedVariables::new(),
            )
            .unwrap_err();
        assert!(
            matches!(&err, RenderError::MissingVariable { variable, .. } if variable == "UNDEF"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_strict_reports_earliest_missing_name() {
        let err = renderer()
            .render(b"{{ B }}\n{{ A }}", &options(MissingKeyPolicy::Strict), &ResolvedVariables::new())
            .unwrap_err();
        assert!(
            matches!(&err, RenderError::MissingVariable { variable, line: Some(1), .. } if variable == "B"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_strict_allows_definedness_tests_and_local_names() {
        let v = vars(&[("ITEMS", Scalar::from("a,b"))]);
        let source = "{% if OPTIONAL is defined %}{{ OPTIONAL }}{% endif %}\
                      {% set list = ITEMS | split(pat=\",\") %}{% for c in list %}{{ c }}{% endfor %}\
                      {% set last = \"z\" %}{{ last }}";
        assert_eq!(render_ok(source, &options(MissingKeyPolicy::Strict), &v), "abz");
    }

    #[test]
    fn test_now_uses_injected_clock() {
        use chrono::TimeZone;

        let fixed = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let renderer = renderer().with_clock(Arc::new(move || fixed));
        let out = renderer
            .render(
                b"built {{ now(utc=true, format=\"%Y-%m-%d\") }}",
                &options(MissingKeyPolicy::Strict),
                &ResolvedVariables::new(),
            )
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "built 2024-01-02");
    }

    #[test]
    fn test_zero_renders_empty() {
        let out = render_ok(
            "[{{ .MISSING }}]{% if OTHER %}x{% endif %}",
            &options(MissingKeyPolicy::Zero),
            &ResolvedVariables::new(),
        );
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_custom_delimiters_leave_braces_alone() {
        let opts = RenderOptions {
            template_name: "Taskfile.yml".into(),
            delimiters: Delimiters {
                open: "[[".into(),
                close: "]]".into(),
            },
            missing_key: MissingKeyPolicy::Strict,
        };
        let v = vars(&[("NAME", Scalar::from("demo"))]);
        let out = render_ok("cmd: echo {{.TASK}} [[ .NAME | upper ]] {% raw %}", &opts, &v);
        assert_eq!(out, "cmd: echo {{.TASK}} DEMO {% raw %}");
    }

    #[test]
    fn test_parse_error_has_line() {
        let err = renderer()
            .render(b"ok\n{% if X %}\nno end\n", &options(MissingKeyPolicy::Zero), &ResolvedVariables::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn test_unclosed_tag_is_parse_error() {
        let err = renderer()
            .render(b"a\n{{ X", &options(MissingKeyPolicy::Strict), &ResolvedVariables::new())
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::Parse {
                template: "Makefile".into(),
                message: "unclosed `{{` tag".into(),
                line: Some(2),
            }
        );
    }

    #[test]
    fn test_execute_error_is_distinct() {
        let err = renderer()
            .render(
                b"{{ X | trimSuffix }}",
                &options(MissingKeyPolicy::Strict),
                &vars(&[("X", Scalar::from("a"))]),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::Execute { .. }), "got {err:?}");
    }

    #[test]
    fn test_env_function_uses_capability() {
        assert_eq!(
            render_ok("{{ env(name=\"SHELL_NAME\") }}", &options(MissingKeyPolicy::Strict), &ResolvedVariables::new()),
            "zsh"
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let err = renderer()
            .render(&[0xff, 0xfe], &options(MissingKeyPolicy::Strict), &ResolvedVariables::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::Parse { line: None, .. }));
    }
}
