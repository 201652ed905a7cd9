//! Common context for CLI commands

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::{DuckConfig, RuntimeSettings};
use crate::run::Runner;
use crate::source::GitFetcher;
use crate::templating::TemplateRenderer;
use crate::variables::{Environment, ProcessEnvironment, VariableResolver};

/// Everything a command needs: the validated config, runtime settings and
/// the process environment.
pub struct CommandContext {
    /// Parsed and validated `duck.yaml`
    pub config: DuckConfig,
    /// Where the config was read from
    pub config_path: PathBuf,
    /// Cache root and timeouts
    pub settings: RuntimeSettings,
    /// Ambient environment handed to the resolver and renderer
    pub env: Arc<dyn Environment>,
    /// Suppress informational output
    pub quiet: bool,
}

impl CommandContext {
    /// Locate and load the config, then read runtime settings.
    ///
    /// `config_path` overrides discovery in the current directory and
    /// `cache_dir` overrides `DUCK_CACHE_DIR`.
    pub async fn load(config_path: Option<PathBuf>, cache_dir: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => {
                let cwd = std::env::current_dir()
                    .context("Failed to determine the current directory")?;
                DuckConfig::discover(&cwd)?
            }
        };
        let config = DuckConfig::load(&config_path).await?;

        let env: Arc<dyn Environment> = Arc::new(ProcessEnvironment);
        let settings = RuntimeSettings::from_environment(env.as_ref())?.with_cache_dir(cache_dir);
        tracing::debug!("Using cache root {}", settings.cache_dir.display());

        Ok(Self {
            config,
            config_path,
            settings,
            env,
            quiet: false,
        })
    }

    /// Set [`Self::quiet`].
    #[must_use]
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Cache layout for the configured root.
    pub fn cache(&self) -> Cache {
        Cache::new(self.settings.cache_dir.clone())
    }

    /// Runner wired to git and the process environment.
    pub fn runner(&self) -> Runner<GitFetcher> {
        Runner::new(
            self.cache(),
            GitFetcher::new().with_timeout(self.settings.fetch_timeout),
            VariableResolver::new(Arc::clone(&self.env))
                .with_command_timeout(self.settings.command_timeout),
            TemplateRenderer::new(Arc::clone(&self.env)),
        )
    }
}
