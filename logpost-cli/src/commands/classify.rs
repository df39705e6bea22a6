//! `logpost classify` command handler
//!
//! Offline dry-run of filter behavior: load a rule file, pick the chain
//! bound to one watched file, and classify lines without tailing anything
//! or opening a broker connection.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use logpost_tail::rule::{FilterChain, Outcome, RuleSet};

use crate::cli::ClassifyArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `classify` command.
pub async fn execute(args: ClassifyArgs, writer: &OutputWriter) -> Result<(), CliError> {
    info!(
        rules = %args.rules.display(),
        target = %args.target.display(),
        "classifying lines offline"
    );

    let rules = RuleSet::load(&args.rules).await?;
    let chain = chain_for_target(&rules, &args.target)?;

    let lines = if args.lines.is_empty() {
        read_stdin_lines()?
    } else {
        args.lines
    };

    let report = classify_lines(&chain, &args.target, &lines);

    writer.render(&report)?;

    Ok(())
}

/// Find the chain bound to `target`.
///
/// The rule loader stores absolute filenames, so the target is absolutized
/// the same way before comparison.
fn chain_for_target(rules: &RuleSet, target: &Path) -> Result<FilterChain, CliError> {
    let target_abs = std::path::absolute(target)?;

    for (path, chain) in rules.build_chains()? {
        if path == target_abs {
            return Ok(chain);
        }
    }

    let known: Vec<String> = rules
        .entries()
        .iter()
        .map(|e| e.filename.clone())
        .collect();
    Err(CliError::Command(format!(
        "no rules for target {} (watched files: {})",
        target_abs.display(),
        if known.is_empty() {
            "none".to_owned()
        } else {
            known.join(", ")
        }
    )))
}

fn read_stdin_lines() -> Result<Vec<String>, CliError> {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        lines.push(line?);
    }
    Ok(lines)
}

fn classify_lines(chain: &FilterChain, target: &Path, lines: &[String]) -> ClassifyReport {
    let mut rows = Vec::with_capacity(lines.len());
    let mut emitted = 0usize;

    for line in lines {
        match chain.classify(line) {
            Outcome::Emit(record) => {
                emitted += 1;
                rows.push(ClassifyRow {
                    line: line.clone(),
                    outcome: "emit".to_owned(),
                    record: Some(record.to_value()),
                });
            }
            Outcome::Drop => {
                rows.push(ClassifyRow {
                    line: line.clone(),
                    outcome: "drop".to_owned(),
                    record: None,
                });
            }
        }
    }

    ClassifyReport {
        target: target.display().to_string(),
        total: rows.len(),
        emitted,
        rows,
    }
}

/// Classification dry-run result.
#[derive(Serialize)]
pub struct ClassifyReport {
    pub target: String,
    pub total: usize,
    pub emitted: usize,
    pub rows: Vec<ClassifyRow>,
}

/// One classified line. `record` carries the JSON payload that the
/// publisher would ship, present only for emitted lines.
#[derive(Serialize)]
pub struct ClassifyRow {
    pub line: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
}

impl Render for ClassifyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Classify: {} ({}/{} emitted)",
            self.target.bold(),
            self.emitted,
            self.total
        )?;
        writeln!(w)?;

        for row in &self.rows {
            match &row.record {
                Some(record) => {
                    writeln!(w, "{:<6} {}", "emit".green(), record)?;
                }
                None => {
                    writeln!(w, "{:<6} {}", "drop".yellow(), row.line.dimmed())?;
                }
            }
        }

        Ok(())
    }
}
