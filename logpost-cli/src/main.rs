//! logpost CLI entry point.
//!
//! Parses arguments, initializes logging to stderr, and dispatches to the
//! subcommand handlers. Errors are printed and mapped to exit codes via
//! [`CliError::exit_code`].

use clap::Parser;
use colored::Colorize;

use logpost_cli::cli::{Cli, Commands};
use logpost_cli::commands;
use logpost_cli::error::CliError;
use logpost_cli::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_deref());

    let writer = OutputWriter::new(cli.format);
    let config_path = cli.config;

    let result = match cli.command {
        Commands::Status(args) => commands::status::execute(args, &config_path, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &config_path, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &config_path, &writer).await,
        Commands::Classify(args) => commands::classify::execute(args, &writer).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

/// Diagnostics go to stderr so command output on stdout stays parseable.
/// Quiet by default; `--log-level debug` or `RUST_LOG` opens it up.
fn init_tracing(log_level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.unwrap_or("warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
