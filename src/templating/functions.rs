//! Filters and functions registered on top of Tera's built-ins.
//!
//! Filters: `sha256sum`, `trimSuffix(suffix=…)`, `trimPrefix(prefix=…)`,
//! `quote`, `squote`.
//!
//! Functions: `now(format=…, utc=…, timestamp=…)` and `env(name=…, default=…)`.
//! Both are evaluated at render time and are not part of the cache key, so a
//! cache hit keeps whatever value was rendered first.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tera::{Tera, Value};

use crate::variables::Environment;

/// Source of the current time for `now()`.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The wall clock.
#[must_use]
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Register every duck filter and function on `tera`.
pub fn register(tera: &mut Tera, env: Arc<dyn Environment>, clock: Clock) {
    tera.register_filter("sha256sum", sha256sum);
    tera.register_filter("trimSuffix", trim_suffix);
    tera.register_filter("trimPrefix", trim_prefix);
    tera.register_filter("quote", quote);
    tera.register_filter("squote", squote);
    tera.register_function("now", make_now(clock));
    tera.register_function("env", make_env(env));
}

/// String form of a filter input. Non-strings are rendered the way Tera
/// prints them.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_arg(args: &HashMap<String, Value>, name: &str, filter: &str) -> tera::Result<String> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(as_text(other)),
        None => Err(tera::Error::msg(format!(
            "Filter `{filter}` expected an argument `{name}`"
        ))),
    }
}

fn sha256sum(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(hex::encode(Sha256::digest(as_text(value).as_bytes()))))
}

fn trim_suffix(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let suffix = string_arg(args, "suffix", "trimSuffix")?;
    let text = as_text(value);
    Ok(Value::String(text.strip_suffix(suffix.as_str()).unwrap_or(&text).to_string()))
}

fn trim_prefix(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let prefix = string_arg(args, "prefix", "trimPrefix")?;
    let text = as_text(value);
    Ok(Value::String(text.strip_prefix(prefix.as_str()).unwrap_or(&text).to_string()))
}

fn quote(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let quoted = serde_json::to_string(&as_text(value))
        .map_err(|e| tera::Error::msg(format!("quote: {e}")))?;
    Ok(Value::String(quoted))
}

fn squote(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(format!("'{}'", as_text(value))))
}

fn make_now(clock: Clock) -> impl tera::Function + 'static {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let now = clock();
        let utc = args.get("utc").and_then(Value::as_bool).unwrap_or(false);
        let timestamp = args.get("timestamp").and_then(Value::as_bool).unwrap_or(false);

        if timestamp {
            return Ok(Value::from(now.timestamp()));
        }

        let format = args.get("format").and_then(Value::as_str);
        let mut out = String::new();
        let written = match (format, utc) {
            (Some(f), true) => write!(out, "{}", now.format(f)),
            (Some(f), false) => write!(out, "{}", now.with_timezone(&chrono::Local).format(f)),
            (None, true) => write!(out, "{}", now.to_rfc3339()),
            (None, false) => write!(out, "{}", now.with_timezone(&chrono::Local).to_rfc3339()),
        };
        written.map_err(|_| {
            tera::Error::msg(format!(
                "Function `now` received an invalid format string `{}`",
                format.unwrap_or_default()
            ))
        })?;
        Ok(Value::String(out))
    }
}

fn make_env(env: Arc<dyn Environment>) -> impl tera::Function + 'static {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        let name = args.get("name").and_then(Value::as_str).ok_or_else(|| {
            tera::Error::msg("Function `env` expected a string argument `name`")
        })?;
        let value = env
            .var(name)
            .or_else(|| args.get("default").map(as_text))
            .unwrap_or_default();
        Ok(Value::String(value))
    }
}
