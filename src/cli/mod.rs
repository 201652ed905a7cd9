//! Command-line interface for duck.
//!
//! ```bash
//! duck [OPTIONS] [TARGET] [ARGS]...   # render (if needed) and run TARGET
//! duck sync [TARGET] [--force]        # render and link without running
//! duck clean [TARGET]                 # drop cached state
//! duck list [-r] [-V] [-e]            # show targets
//! ```
//!
//! Without a subcommand the first positional argument selects a named target
//! when one exists. Otherwise the default target runs and every positional
//! argument, hyphenated ones included, is passed through to the binary:
//!
//! ```bash
//! duck build -j8        # default target `make`: make -f .duck/default/Makefile build -j8
//! duck lint --fix       # named target `lint`:   golangci-lint --config ... --fix
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` takes precedence over `--verbose`
//! (debug) and `--quiet` (errors only); the default level is `warn`.

mod clean;
pub mod common;
mod list;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::DuckConfig;
use common::CommandContext;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(
    name = "duck",
    about = "Render a pinned remote template and run a tool against it",
    version,
    args_conflicts_with_subcommands = true,
    long_about = "duck fetches a template from a git repository at a pinned ref, renders it \
                  with variables from literals, the environment, files and commands, caches the \
                  result by content and runs the configured binary with the rendered file."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors and suppress informational output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Config file to use instead of duck.yaml in the current directory
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Cache root (default .duck)
    #[arg(long, global = true, value_name = "PATH", env = "DUCK_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Target name, then arguments passed through to the binary
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render and link targets without running them
    Sync(sync::SyncCommand),

    /// Remove cached objects and per-target state
    Clean(clean::CleanCommand),

    /// List configured targets
    List(list::ListCommand),
}

impl Cli {
    /// Run the parsed command line.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        let ctx = CommandContext::load(self.config, self.cache_dir)
            .await?
            .with_quiet(self.quiet);

        match self.command {
            Some(Commands::Sync(cmd)) => cmd.execute(&ctx).await,
            Some(Commands::Clean(cmd)) => cmd.execute(&ctx).await,
            Some(Commands::List(cmd)) => cmd.execute(&ctx),
            None => {
                let (name, passthrough) = select_target(&ctx.config, &self.args);
                let (name, target) = ctx.config.target(name)?;
                tracing::debug!("Running target {} with {} argument(s)", name, passthrough.len());
                ctx.runner().exec(target, name, passthrough).await
            }
        }
    }
}

/// Split positional arguments into a target name and passthrough arguments.
///
/// The first argument is a target name only when it names a defined target;
/// otherwise the empty name (default target) is returned with every argument.
fn select_target<'a>(config: &DuckConfig, args: &'a [String]) -> (&'a str, &'a [String]) {
    match args.split_first() {
        Some((first, rest)) if config.has_target(first) => (first.as_str(), rest),
        _ => ("", args),
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r"
default:
  binary: make
  template: { repo: r, path: Makefile.tpl }
targets:
  lint:
    binary: golangci-lint
    template: { repo: r, path: lint.yml.tpl }
";

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_select_named_target() {
        let config = DuckConfig::from_yaml_str(CONFIG, "duck.yaml").unwrap();
        let args = strings(&["lint", "--fix"]);
        assert_eq!(select_target(&config, &args), ("lint", &args[1..]));
    }

    #[test]
    fn test_select_default_target() {
        let config = DuckConfig::from_yaml_str(CONFIG, "duck.yaml").unwrap();
        let args = strings(&["build", "-j8"]);
        assert_eq!(select_target(&config, &args), ("", &args[..]));
        assert_eq!(select_target(&config, &[]), ("", &[][..]));
    }

    #[test]
    fn test_parse_passthrough() {
        let cli = Cli::try_parse_from(["duck", "-v", "lint", "--fix", "-q", "./..."]).unwrap();
        assert!(cli.verbose);
        assert!(cli.command.is_none());
        assert_eq!(cli.args, strings(&["lint", "--fix", "-q", "./..."]));
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["duck", "sync", "lint", "--force"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Sync(_))));

        let cli = Cli::try_parse_from(["duck", "list", "-r", "-V", "-e"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List(_))));

        let cli = Cli::try_parse_from(["duck", "--cache-dir", "/tmp/c", "clean"]).unwrap();
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    #[serial_test::serial]
    fn test_cache_dir_from_environment() {
        // SAFETY: serialized with every other test that touches DUCK_CACHE_DIR
        unsafe { std::env::set_var("DUCK_CACHE_DIR", "/tmp/from-env") };
        let from_env = Cli::try_parse_from(["duck", "sync"]).unwrap();
        let from_flag = Cli::try_parse_from(["duck", "--cache-dir", "flag", "sync"]).unwrap();
        unsafe { std::env::remove_var("DUCK_CACHE_DIR") };

        assert_eq!(from_env.cache_dir, Some(PathBuf::from("/tmp/from-env")));
        assert_eq!(from_flag.cache_dir, Some(PathBuf::from("flag")));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
