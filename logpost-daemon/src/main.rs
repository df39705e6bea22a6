//! logpost-daemon entry point.
//!
//! Parses CLI arguments, loads configuration, initializes logging, and
//! hands control to the [`Orchestrator`].

use anyhow::Result;
use clap::Parser;

use logpost_core::config::LogpostConfig;
use logpost_daemon::cli::DaemonCli;
use logpost_daemon::logging;
use logpost_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogpostConfig::load(&cli.config).await.map_err(|e| {
        anyhow::anyhow!("failed to load config from {}: {}", cli.config.display(), e)
    })?;

    // CLI flags take precedence over config file and environment variables
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    if let Some(pid_file) = cli.pid_file {
        config.general.pid_file = pid_file;
    }

    if cli.validate {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "logpost-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("logpost-daemon shut down");
    Ok(())
}
