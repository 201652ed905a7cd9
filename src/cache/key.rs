//! Cache key derivation.
//!
//! A key is the SHA-256 of a compact JSON document with a fixed field order:
//!
//! ```json
//! {"repo":"…","ref":"…","path":"…","vars":[{"k":"NAME","v":"value"}, …]}
//! ```
//!
//! `vars` is sorted by name, so declaration order never matters, and scalars
//! keep their JSON type, so `1` and `"1"` give different keys. Render-time
//! functions such as `now()` and `env()` are not part of the key.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::Scalar;
use crate::constants::CACHE_KEY_LEN;
use crate::variables::ResolvedVariables;

/// Content address of a rendered artifact: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

#[derive(Serialize)]
struct KeyPayload<'a> {
    repo: &'a str,
    #[serde(rename = "ref")]
    git_ref: &'a str,
    path: &'a str,
    vars: Vec<KeyVar<'a>>,
}

#[derive(Serialize)]
struct KeyVar<'a> {
    k: &'a str,
    v: &'a Scalar,
}

impl CacheKey {
    /// Fingerprint of everything that determines the rendered bytes.
    pub fn derive(
        repo: &str,
        git_ref: &str,
        path: &str,
        vars: &ResolvedVariables,
    ) -> Result<Self, serde_json::Error> {
        // ResolvedVariables iterates in name order already
        let payload = KeyPayload {
            repo,
            git_ref,
            path,
            vars: vars.iter().map(|(k, v)| KeyVar { k, v }).collect(),
        };
        let encoded = serde_json::to_vec(&payload)?;
        Ok(Self(hex::encode(Sha256::digest(&encoded))))
    }

    /// Accept `s` only if it looks like a key (used when reading links back).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == CACHE_KEY_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    /// The hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, Scalar)]) -> ResolvedVariables {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_fixed_vector() {
        let key = CacheKey::derive(
            "https://example.com/t.git",
            "v1",
            "a/b.tpl",
            &vars(&[("N", Scalar::Integer(1)), ("ENV1", Scalar::from("hello"))]),
        )
        .unwrap();
        assert_eq!(
            key.as_str(),
            "2a2ad5c2be31b4c3585906550715b8efbaf1fd4900a64266aeb41446249e08f2"
        );
    }

    #[test]
    fn test_empty_variable_set() {
        let key = CacheKey::derive("r", "HEAD", "p", &ResolvedVariables::new()).unwrap();
        assert_eq!(
            key.as_str(),
            "4e0933cd99cd511f5fbd462e9af1f69ce7fe795976022e1468ec2d0ac612f0b2"
        );
    }

    #[test]
    fn test_order_independent() {
        let a = vars(&[("A", Scalar::from("1")), ("B", Scalar::from("2"))]);
        let b = vars(&[("B", Scalar::from("2")), ("A", Scalar::from("1"))]);
        assert_eq!(
            CacheKey::derive("r", "main", "p", &a).unwrap(),
            CacheKey::derive("r", "main", "p", &b).unwrap()
        );
    }

    #[test]
    fn test_each_component_changes_key() {
        let v = vars(&[("A", Scalar::from("1"))]);
        let base = CacheKey::derive("r", "main", "p", &v).unwrap();
        assert_ne!(base, CacheKey::derive("r2", "main", "p", &v).unwrap());
        assert_ne!(base, CacheKey::derive("r", "dev", "p", &v).unwrap());
        assert_ne!(base, CacheKey::derive("r", "main", "q", &v).unwrap());
        assert_ne!(
            base,
            CacheKey::derive("r", "main", "p", &vars(&[("A", Scalar::from("2"))])).unwrap()
        );
    }

    #[test]
    fn test_scalar_type_is_significant() {
        let text = CacheKey::derive("r", "m", "p", &vars(&[("A", Scalar::from("1"))])).unwrap();
        let int = CacheKey::derive("r", "m", "p", &vars(&[("A", Scalar::Integer(1))])).unwrap();
        assert_ne!(text, int);
    }

    #[test]
    fn test_parse() {
        let key = CacheKey::derive("r", "m", "p", &ResolvedVariables::new()).unwrap();
        assert_eq!(CacheKey::parse(key.as_str()), Some(key.clone()));
        assert_eq!(key.short().len(), 12);
        assert!(CacheKey::parse("abc").is_none());
        assert!(CacheKey::parse(&key.as_str().to_uppercase()).is_none());
        assert!(CacheKey::parse(&"g".repeat(64)).is_none());
    }
}
