//! Template rendering for duck targets.
//!
//! Templates are Tera templates with two additions:
//!
//! - Expression and statement delimiters can be replaced per target
//!   (`delims: { left: "[[", right: "]]" }`). Everything outside the custom
//!   tags, including literal `{{ }}`, is copied through untouched.
//! - A leading dot on variable references is accepted, so `{{ .NAME }}` and
//!   `{{ NAME }}` are the same.
//!
//! # Missing variables
//!
//! With [`MissingKeyPolicy::Strict`] (the default) a reference to an
//! undefined variable fails with [`RenderError::MissingVariable`]. With
//! [`MissingKeyPolicy::Zero`] every referenced top-level name that has no
//! value renders as an empty string.
//!
//! # Extra filters and functions
//!
//! See [`functions`]: `sha256sum`, `trimSuffix`, `trimPrefix`, `quote`,
//! `squote`, `now()` and `env()` on top of Tera's built-ins.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use duckfile::config::Scalar;
//! use duckfile::templating::{RenderOptions, TemplateRenderer};
//! use duckfile::variables::{MapEnvironment, ResolvedVariables};
//!
//! let renderer = TemplateRenderer::new(Arc::new(MapEnvironment::default()));
//! let mut vars = ResolvedVariables::new();
//! vars.insert("ENV1", Scalar::from("hello"));
//!
//! let out = renderer
//!     .render(b"value={{.ENV1}}", &RenderOptions::default(), &vars)
//!     .unwrap();
//! assert_eq!(out, b"value=hello");
//! ```

pub mod error;
pub mod functions;
pub mod renderer;
pub mod syntax;

pub use error::RenderError;
pub use functions::Clock;
pub use renderer::{Delimiters, MissingKeyPolicy, RenderOptions, TemplateRenderer};
