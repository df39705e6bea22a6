//! `logpost status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use logpost_core::config::LogpostConfig;

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogpostConfig::load(config_path).await?;

    let report = build_status_report(&config, args.verbose);

    writer.render(&report)?;

    Ok(())
}

fn build_status_report(config: &LogpostConfig, verbose: bool) -> StatusReport {
    let daemon_running = check_daemon_status(&config.general.pid_file);
    let health = if daemon_running {
        "running".to_owned()
    } else {
        "stopped".to_owned()
    };

    let mut modules = Vec::new();

    if config.tail.enabled {
        modules.push(ModuleStatus {
            name: "tail-pipeline".to_owned(),
            health: health.clone(),
            details: if verbose {
                Some(format!(
                    "filter_file={}, channel_capacity={}, max_line_bytes={}",
                    config.tail.filter_file,
                    config.tail.channel_capacity,
                    config.tail.max_line_bytes
                ))
            } else {
                None
            },
        });
    }

    if config.broker.enabled {
        modules.push(ModuleStatus {
            name: "broker-publisher".to_owned(),
            health: health.clone(),
            details: if verbose {
                Some(format!(
                    "broker={}:{}, exchange={}, queue={}",
                    config.broker.host,
                    config.broker.port,
                    config.broker.exchange,
                    config.broker.queue
                ))
            } else {
                None
            },
        });
    }

    if config.metrics.enabled {
        modules.push(ModuleStatus {
            name: "metrics".to_owned(),
            health: health.clone(),
            details: if verbose {
                Some(format!(
                    "listen={}:{}{}",
                    config.metrics.listen_addr, config.metrics.port, config.metrics.endpoint
                ))
            } else {
                None
            },
        });
    }

    StatusReport {
        daemon_running,
        pid_file: config.general.pid_file.clone(),
        modules,
    }
}

/// Check if the daemon is running by reading the PID file and probing the
/// process.
fn check_daemon_status(pid_file: &str) -> bool {
    if pid_file.is_empty() {
        debug!("no pid file configured");
        return false;
    }

    let pid_path = Path::new(pid_file);
    if !pid_path.exists() {
        debug!(pid_file, "pid file does not exist");
        return false;
    }

    let pid_content = match std::fs::read_to_string(pid_path) {
        Ok(content) => content,
        Err(e) => {
            warn!(pid_file, error = %e, "failed to read pid file");
            return false;
        }
    };

    let pid = match pid_content.trim().parse::<u32>() {
        Ok(p) => p,
        Err(e) => {
            warn!(pid_file, error = %e, "failed to parse pid");
            return false;
        }
    };

    is_process_alive(pid)
}

/// Check if a process with the given PID is alive.
#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use std::io::ErrorKind;

    // Signal 0 probes for existence without affecting the target process
    // SAFETY: kill(2) with signal 0 performs no action beyond the check
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };

    if result == 0 {
        true
    } else {
        let err = std::io::Error::last_os_error();
        match err.kind() {
            // Process exists but we lack permission to signal it
            ErrorKind::PermissionDenied => true,
            _ => false,
        }
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    warn!("process liveness check not supported on this platform");
    false
}

#[derive(Serialize)]
pub struct StatusReport {
    pub daemon_running: bool,
    pub pid_file: String,
    pub modules: Vec<ModuleStatus>,
}

#[derive(Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub health: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.daemon_running {
            writeln!(w, "Daemon: {}", "running".green().bold())?;
        } else {
            writeln!(w, "Daemon: {}", "not running".red().bold())?;
        }

        writeln!(w)?;
        writeln!(w, "{:<20} Health", "Module")?;
        writeln!(w, "{}", "-".repeat(40))?;

        for m in &self.modules {
            let health_colored = match m.health.as_str() {
                "running" => m.health.green(),
                "stopped" => m.health.yellow(),
                _ => m.health.normal(),
            };

            writeln!(w, "{:<20} {}", m.name, health_colored)?;

            if let Some(details) = &m.details {
                writeln!(w, "  {}", details.dimmed())?;
            }
        }

        Ok(())
    }
}
