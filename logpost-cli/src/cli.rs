//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Logpost -- log shipping agent operator tool.
///
/// Use `logpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logpost.toml configuration file.
    #[arg(short, long, default_value = "logpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check daemon and module status.
    Status(StatusArgs),

    /// Inspect and validate filter rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),

    /// Classify lines against a rule file without running the pipeline.
    Classify(ClassifyArgs),
}

// ---- status ----

/// Display daemon liveness and per-module configuration.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show detailed per-module settings.
    #[arg(short, long)]
    pub verbose: bool,
}

// ---- rules ----

/// Inspect and validate filter rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List watched files and the rules bound to each.
    List {
        /// Rule file to read (default: `tail.filter_file` from the configuration).
        #[arg(short = 'f', long)]
        rules: Option<PathBuf>,
    },
    /// Validate a rule file without starting the pipeline.
    Check {
        /// Rule file to read (default: `tail.filter_file` from the configuration).
        #[arg(short = 'f', long)]
        rules: Option<PathBuf>,
    },
}

// ---- config ----

/// Manage logpost configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, tail, broker, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

// ---- classify ----

/// Run lines through the filter chain of one watched file, offline.
///
/// Lines come from the positional arguments, or from stdin when none are
/// given. Nothing is tailed and no broker connection is made.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Rule file to load.
    #[arg(short = 'f', long)]
    pub rules: PathBuf,

    /// Watched file whose rule chain should classify the lines.
    #[arg(short, long)]
    pub target: PathBuf,

    /// Lines to classify (reads stdin when omitted).
    pub lines: Vec<String>,
}
