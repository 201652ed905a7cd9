//! `duck clean`: remove cached state.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::run::{CleanReport, CleanScope};

/// Arguments for `duck clean`.
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Only clean this target (the whole cache root when omitted)
    target: Option<String>,
}

impl CleanCommand {
    /// Clean the selected scope and print what was removed.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let runner = ctx.runner();
        let report = match &self.target {
            Some(name) => {
                let (name, target) = ctx.config.target(name)?;
                runner.clean(CleanScope::Target { name, target }).await?
            }
            None => runner.clean(CleanScope::All).await?,
        };

        if !ctx.quiet {
            println!("{}", summary(&report));
        }
        Ok(())
    }
}

fn summary(report: &CleanReport) -> String {
    if *report == CleanReport::default() {
        return "Nothing to clean".bright_black().to_string();
    }
    format!(
        "{} {} object(s) and {} target director{}, freed {}",
        "Removed".green().bold(),
        report.objects_removed,
        report.dirs_removed,
        if report.dirs_removed == 1 { "y" } else { "ies" },
        format_size(report.bytes_freed)
    )
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
