//! Integration test suite for duck
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **pipeline**: the run pipeline through the library API with fake fetchers
//! - **cli**: the `duck` binary end to end against local git repositories

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod pipeline;
