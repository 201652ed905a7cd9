//! duck - remote templating wrapper
//!
//! duck renders a template kept in a git repository at a pinned ref, caches
//! the result by content and runs a local tool against it. A `duck.yaml`
//! declares the targets:
//!
//! ```yaml
//! version: 1
//! default:
//!   binary: make
//!   fileFlag: -f
//!   template:
//!     repo: https://github.com/example/templates.git
//!     ref: v1.2.0
//!     path: make/Makefile.tpl
//!   variables:
//!     PROJECT: demo
//!     USER: !env USER
//!     REV: !cmd git rev-parse --short HEAD
//! ```
//!
//! `duck build` then resolves the variables, renders `Makefile.tpl` into
//! `.duck/objects/<key>/Makefile` (only when no object exists for that key),
//! points `.duck/default/Makefile` at it and runs
//! `make -f .duck/default/Makefile build`.
//!
//! # Modules
//!
//! - [`config`] - `duck.yaml` parsing, validation and target selection
//! - [`variables`] - resolving literal, `!env`, `!file` and `!cmd` bindings
//! - [`templating`] - Tera rendering with custom delimiters and missing-key modes
//! - [`cache`] - cache keys, the content store and stable links
//! - [`source`] / [`git`] - fetching template trees with the system git
//! - [`run`] - the pipeline and the executor
//! - [`cli`] - the `duck` command line
//! - [`core`] - error types and user-facing error formatting
//! - [`utils`] - filesystem and platform helpers

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod run;
pub mod source;
pub mod templating;
pub mod utils;
pub mod variables;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
