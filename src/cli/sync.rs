//! `duck sync`: render and link targets without running them.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::run::SyncReport;

/// Arguments for `duck sync`.
#[derive(Args, Debug)]
pub struct SyncCommand {
    /// Target to sync (all targets when omitted)
    target: Option<String>,

    /// Fetch and render again even when the cached object is current
    #[arg(short, long)]
    force: bool,
}

impl SyncCommand {
    /// Sync the selected targets, printing one line per target.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let targets: Vec<_> = match &self.target {
            Some(name) => vec![ctx.config.target(name)?],
            None => ctx.config.iter_targets().collect(),
        };

        let runner = ctx.runner();
        for (name, target) in targets {
            let report = runner.sync(target, name, self.force).await?;
            if !ctx.quiet {
                println!("{}", describe(name, &report));
            }
        }
        Ok(())
    }
}

fn describe(name: &str, report: &SyncReport) -> String {
    let state = if report.rendered {
        "rendered".green()
    } else {
        "up to date".bright_black()
    };
    let mut line = format!(
        "{} {} {} → {}",
        name.bold(),
        state,
        report.key.short().yellow(),
        report.link_path.display()
    );
    if let Some(old) = &report.superseded {
        line.push_str(&format!(" (replaced {})", old.short()));
    }
    line
}
