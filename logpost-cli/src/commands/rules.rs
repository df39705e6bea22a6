//! `logpost rules` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use logpost_core::config::LogpostConfig;
use logpost_tail::rule::RuleSet;

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List { rules } => {
            let rule_path = resolve_rule_path(rules, config_path).await?;
            execute_list(&rule_path, writer).await
        }
        RulesAction::Check { rules } => {
            let rule_path = resolve_rule_path(rules, config_path).await?;
            execute_check(&rule_path, writer).await
        }
    }
}

/// An explicit `-f` wins; otherwise fall back to `tail.filter_file` from
/// the configuration file.
async fn resolve_rule_path(
    explicit: Option<PathBuf>,
    config_path: &Path,
) -> Result<PathBuf, CliError> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let config = LogpostConfig::load(config_path).await?;
    Ok(PathBuf::from(config.tail.filter_file))
}

async fn execute_list(path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %path.display(), "loading filter rules");

    let rules = RuleSet::load(path).await?;
    let report = build_list_report(path, &rules);

    writer.render(&report)?;

    Ok(())
}

async fn execute_check(path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %path.display(), "checking filter rules");

    let result = RuleSet::load(path).await;

    let report = match result {
        Ok(rules) => RuleCheckReport {
            source: path.display().to_string(),
            valid: true,
            files: rules.file_count(),
            rules: rules.rule_count(),
            errors: Vec::new(),
        },
        Err(e) => RuleCheckReport {
            source: path.display().to_string(),
            valid: false,
            files: 0,
            rules: 0,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Rule("rule file is invalid".to_owned()));
    }

    Ok(())
}

fn build_list_report(path: &Path, rules: &RuleSet) -> RuleListReport {
    RuleListReport {
        source: path.display().to_string(),
        files: rules.file_count(),
        rules: rules.rule_count(),
        entries: rules
            .entries()
            .iter()
            .map(|entry| RuleFileEntry {
                filename: entry.filename.clone(),
                rules: entry
                    .filters
                    .iter()
                    .map(|spec| RuleRow {
                        pattern: spec.pattern.clone(),
                        action: spec.action.to_string(),
                        ignore: spec.ignore,
                        attributes: spec.attributes.keys().cloned().collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Rule listing: one entry per watched file, rules in declaration order.
#[derive(Serialize)]
pub struct RuleListReport {
    pub source: String,
    pub files: usize,
    pub rules: usize,
    pub entries: Vec<RuleFileEntry>,
}

#[derive(Serialize)]
pub struct RuleFileEntry {
    pub filename: String,
    pub rules: Vec<RuleRow>,
}

#[derive(Serialize)]
pub struct RuleRow {
    pub pattern: String,
    pub action: String,
    pub ignore: bool,
    pub attributes: Vec<String>,
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Filter Rules: {} ({} files, {} rules)",
            self.source.bold(),
            self.files,
            self.rules
        )?;

        for entry in &self.entries {
            writeln!(w)?;
            writeln!(w, "{}", entry.filename.bold())?;
            writeln!(
                w,
                "  {:<40} {:<10} {:<8} Attributes",
                "Pattern", "Action", "Ignore"
            )?;
            writeln!(w, "  {}", "-".repeat(80))?;

            for rule in &entry.rules {
                let ignore_colored = if rule.ignore {
                    "yes".yellow()
                } else {
                    "no".normal()
                };
                writeln!(
                    w,
                    "  {:<40} {:<10} {:<8} {}",
                    rule.pattern,
                    rule.action,
                    ignore_colored,
                    rule.attributes.join(", ")
                )?;
            }
        }

        Ok(())
    }
}

/// Rule file validation result.
#[derive(Serialize)]
pub struct RuleCheckReport {
    pub source: String,
    pub valid: bool,
    pub files: usize,
    pub rules: usize,
    pub errors: Vec<String>,
}

impl Render for RuleCheckReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Check: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
            writeln!(w, "  Files: {}, Rules: {}", self.files, self.rules)?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
