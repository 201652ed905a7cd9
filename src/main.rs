//! duck command-line entry point.

use anyhow::Result;
use clap::Parser;
use duckfile::cli;
use duckfile::core::{DuckError, user_friendly_error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            // The wrapped tool already reported its own failure.
            if let Some(DuckError::ChildExited { code, .. }) = e.downcast_ref::<DuckError>() {
                std::process::exit(*code);
            }
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
