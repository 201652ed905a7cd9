//! Core types for duck.
//!
//! Everything the pipeline can fail with is a [`DuckError`]. Binaries and
//! glue code carry errors as [`anyhow::Error`] and recover the typed error at
//! the top through [`user_friendly_error`], which attaches details and a
//! suggestion for display.
//!
//! ```rust,no_run
//! use duckfile::core::{DuckError, user_friendly_error};
//!
//! let err = anyhow::Error::from(DuckError::GitNotFound);
//! user_friendly_error(err).display();
//! ```

pub mod error;

pub use error::{DuckError, ErrorContext, user_friendly_error};
