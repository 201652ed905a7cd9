//! Variable bindings as declared in `duck.yaml`.
//!
//! A binding is either a plain YAML scalar or one of three tagged forms:
//!
//! ```yaml
//! variables:
//!   PROJECT: demo                       # Literal
//!   PORT: 8080                          # Literal (integer)
//!   USER: !env USER                     # EnvRef
//!   REV: !cmd git rev-parse --short HEAD  # CommandRef
//!   LICENSE: !file LICENSE              # FileRef
//! ```

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;

/// A concrete variable value.
///
/// Serialized without a wrapper so `1` and `"1"` stay distinct in the cache
/// key and in template contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// `true` / `false`
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Floating point
    Float(f64),
    /// Text
    String(String),
}

impl Scalar {
    /// Empty string, used for absent environment variables.
    #[must_use]
    pub fn empty() -> Self {
        Self::String(String::new())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Where a variable's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableBinding {
    /// Fixed value from the config file.
    Literal(Scalar),
    /// Process environment variable; absent means empty string.
    EnvRef(String),
    /// Shell expression run through `/bin/sh -c`; stdout minus trailing newlines.
    CommandRef(String),
    /// Whole file contents, read as text.
    FileRef(String),
}

impl VariableBinding {
    /// Short origin label used by `duck list --vars`.
    #[must_use]
    pub const fn origin(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::EnvRef(_) => "env",
            Self::CommandRef(_) => "cmd",
            Self::FileRef(_) => "file",
        }
    }
}

impl<'de> Deserialize<'de> for VariableBinding {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        binding_from_value(value).map_err(de::Error::custom)
    }
}

fn binding_from_value(value: Value) -> Result<VariableBinding, String> {
    match value {
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let arg = tag_argument(&tag, tagged.value)?;
            match tag.trim_start_matches('!') {
                "env" => Ok(VariableBinding::EnvRef(arg)),
                "cmd" => Ok(VariableBinding::CommandRef(arg)),
                "file" => Ok(VariableBinding::FileRef(arg)),
                other => Err(format!(
                    "unknown variable tag '!{other}' (expected !env, !cmd or !file)"
                )),
            }
        }
        other => literal_from_value(other).map(VariableBinding::Literal),
    }
}

fn tag_argument(tag: &str, value: Value) -> Result<String, String> {
    let arg = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Err(format!("{tag} expects a scalar argument")),
    };
    if arg.trim().is_empty() {
        return Err(format!("{tag} requires a non-empty argument"));
    }
    Ok(arg)
}

fn literal_from_value(value: Value) -> Result<Scalar, String> {
    match value {
        Value::Null => Ok(Scalar::empty()),
        Value::Bool(b) => Ok(Scalar::Bool(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Scalar::Float(f))
            } else {
                Ok(Scalar::String(n.to_string()))
            }
        }
        Value::String(s) => Ok(Scalar::String(s)),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err("variable values must be scalars (string, number or boolean)".to_string())
        }
        Value::Tagged(_) => Err("nested tags are not supported".to_string()),
    }
}
