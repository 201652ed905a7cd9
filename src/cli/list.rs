//! `duck list`: show configured targets.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::cache::Cache;
use crate::config::{DuckConfig, Target, TemplateSpec};

/// Arguments for `duck list`.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Show where each template comes from
    #[arg(short, long)]
    remote: bool,

    /// Show variable names and where their values come from
    #[arg(short = 'V', long)]
    vars: bool,

    /// Show the command line each target runs
    #[arg(short, long)]
    exec: bool,
}

impl ListCommand {
    /// Print the target table.
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        print!("{}", self.render(&ctx.config, &ctx.cache()));
        Ok(())
    }

    fn render(&self, config: &DuckConfig, cache: &Cache) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {}\n",
            format!("{:<16}", "Name").cyan().bold(),
            format!("{:<20}", "Binary").cyan().bold(),
            "Description".cyan().bold()
        ));
        out.push_str(&format!("{}\n", "-".repeat(60).bright_black()));

        for (name, target) in config.iter_targets() {
            out.push_str(&format!(
                "{} {} {}\n",
                format!("{name:<16}").bright_white(),
                format!("{:<20}", target.binary),
                target.description
            ));
            if self.remote {
                out.push_str(&format!("    template: {}\n", describe_template(&target.template)));
            }
            if self.vars && !target.variables.is_empty() {
                out.push_str(&format!("    variables: {}\n", describe_variables(target)));
            }
            if self.exec {
                out.push_str(&format!("    exec: {}\n", describe_exec(cache, name, target)));
            }
        }
        out
    }
}

fn describe_template(spec: &TemplateSpec) -> String {
    let mut line = format!("{}@{} {}", spec.repo, spec.effective_ref(), spec.path);
    let delims = spec.delimiters();
    if delims != crate::templating::Delimiters::default() {
        line.push_str(&format!(" (delims {} {})", delims.open, delims.close));
    }
    line
}

fn describe_variables(target: &Target) -> String {
    target
        .variables
        .iter()
        .map(|(name, binding)| format!("{name} ({})", binding.origin()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_exec(cache: &Cache, name: &str, target: &Target) -> String {
    let link = cache.link_path(name, target);
    let mut words = vec![target.binary.clone()];
    if !target.file_flag.is_empty() {
        words.push(target.file_flag.clone());
    }
    words.push(link.display().to_string());
    words.extend(target.args.iter().cloned());
    words.iter().map(|w| quote_word(w)).collect::<Vec<_>>().join(" ")
}

fn quote_word(word: &str) -> String {
    if !word.is_empty() && !word.chars().any(|c| c.is_whitespace() || "'\"$`\\".contains(c)) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}
