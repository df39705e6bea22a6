//! Module orchestration -- assembly, channel wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `logpost-daemon`.
//! It loads configuration, creates the record channel, builds enabled
//! modules, manages startup/shutdown ordering, and runs the main event loop.
//!
//! # Startup Order (producers before consumers)
//!
//! 1. Tail Pipeline (produces RecordEvents)
//! 2. Broker Publisher (consumes RecordEvents)
//!
//! # Shutdown Order (same as startup - producers first)
//!
//! 1. Tail Pipeline (stop watching, flush assembled lines)
//! 2. Broker Publisher (drain remaining records, unwind topology)

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use logpost_core::config::LogpostConfig;
use logpost_core::event::RecordEvent;
use logpost_core::plugin::PluginRegistry;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::modules;

/// Seconds between periodic health reports in the main event loop.
const HEALTH_REPORT_INTERVAL_SECS: u64 = 60;

/// The main daemon orchestrator.
///
/// Manages the complete lifecycle of the logpost modules:
/// configuration loading, channel wiring, ordered startup,
/// health monitoring, and graceful shutdown.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogpostConfig,
    /// Registry of all plugins (ordered for start/stop).
    plugins: PluginRegistry,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Record channel sender held by the daemon.
    ///
    /// Keeps the channel open while the tail pipeline is disabled so the
    /// publisher idles instead of treating its input as exhausted.
    #[allow(dead_code)]
    record_tx: mpsc::Sender<RecordEvent>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// This performs the following steps:
    /// 1. Load `logpost.toml` and apply environment variable overrides
    /// 2. Validate the configuration
    /// 3. Create the record channel
    /// 4. Initialize enabled modules
    ///
    /// # Arguments
    ///
    /// * `config_path` - Path to the `logpost.toml` configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any enabled module fails to initialize
    #[allow(dead_code)] // Public API for tests
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogpostConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when config has already been loaded.
    pub async fn build_from_config(config: LogpostConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before module initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        tracing::debug!(
            capacity = config.tail.channel_capacity,
            "creating record channel"
        );

        let (record_tx, record_rx) = mpsc::channel::<RecordEvent>(config.tail.channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(16);

        let mut plugins = PluginRegistry::new();

        // Register the producer first so startup order matches channel flow
        if let Some(module) = modules::tail::init(&config, record_tx.clone())? {
            plugins.register(Box::new(module))?;
        }

        if config.broker.enabled {
            if let Some(module) = modules::publish::init(&config, record_rx)? {
                plugins.register(Box::new(module))?;
            }
        } else {
            // Without a publisher the tail pipeline would fill the channel,
            // so drain records and log them instead
            tracing::debug!("broker publisher disabled, spawning record drain task");
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(drain_records(record_rx, shutdown_rx));
        }

        tracing::info!(total_plugins = plugins.count(), "orchestrator initialized");

        // Record daemon metrics
        if config.metrics.enabled {
            record_daemon_metrics(plugins.count());
        }

        Ok(Self {
            config,
            plugins,
            shutdown_tx,
            start_time: Instant::now(),
            record_tx,
        })
    }

    /// Start all enabled modules and enter the main event loop.
    ///
    /// This method blocks until a shutdown signal is received.
    /// Modules are started in dependency order (producers first).
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        // Write PID file if configured
        if !self.config.general.pid_file.is_empty() {
            let path = Path::new(&self.config.general.pid_file);
            write_pid_file(path)?;
        }

        // Initialize and start all plugins
        tracing::info!("initializing all plugins");
        if let Err(e) = self.plugins.init_all().await {
            tracing::error!(error = %e, "plugin initialization failed");
            if !self.config.general.pid_file.is_empty() {
                let path = Path::new(&self.config.general.pid_file);
                remove_pid_file(path);
            }
            return Err(e.into());
        }

        tracing::info!("starting all plugins");
        if let Err(e) = self.plugins.start_all().await {
            // Rollback: stop any plugins that were successfully started
            tracing::warn!("startup failed, rolling back already-started plugins");
            if let Err(stop_err) = self.plugins.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }

            // Cleanup PID file on startup failure
            if !self.config.general.pid_file.is_empty() {
                let path = Path::new(&self.config.general.pid_file);
                remove_pid_file(path);
            }
            return Err(e.into());
        }

        // Spawn uptime updater task
        let mut uptime_updater_task = if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let start_time = self.start_time;
            Some(spawn_uptime_updater(start_time, shutdown_rx))
        } else {
            None
        };

        // Main event loop
        tracing::info!("entering main event loop");
        let signal = self.run_until_shutdown().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        // Initiate shutdown
        tracing::info!("broadcasting shutdown signal to all tasks");
        let _ = self.shutdown_tx.send(());

        // Wait for uptime updater to finish
        if let Some(task) = uptime_updater_task.take() {
            let _ = task.await;
        }

        // Stop all modules
        self.shutdown().await?;

        // Remove PID file
        if !self.config.general.pid_file.is_empty() {
            let path = Path::new(&self.config.general.pid_file);
            remove_pid_file(path);
        }

        Ok(())
    }

    /// Block until SIGTERM or SIGINT arrives, reporting health periodically.
    ///
    /// Returns the name of the signal that triggered the shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed.
    async fn run_until_shutdown(&mut self) -> Result<&'static str> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

        let mut health_interval = tokio::time::interval(tokio::time::Duration::from_secs(
            HEALTH_REPORT_INTERVAL_SECS,
        ));
        health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the first
        // report lands one full interval after startup
        health_interval.tick().await;

        loop {
            tokio::select! {
                _ = sigterm.recv() => return Ok("SIGTERM"),
                _ = sigint.recv() => return Ok("SIGINT"),
                _ = health_interval.tick() => {
                    let report = self.health().await;
                    if report.status.is_healthy() {
                        tracing::debug!(
                            uptime_secs = report.uptime_secs,
                            "periodic health report: all modules healthy"
                        );
                    } else {
                        tracing::warn!(
                            status = %report.status,
                            uptime_secs = report.uptime_secs,
                            "periodic health report"
                        );
                    }
                }
            }
        }
    }

    /// Perform graceful shutdown of all plugins.
    ///
    /// Stops plugins in registration order (producers first, consumers last).
    /// This allows consumers to drain remaining events from their channels.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all plugins");
        self.plugins.stop_all().await.map_err(|e| e.into())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let statuses = self.plugins.health_check_all().await;
        let modules: Vec<ModuleHealth> = statuses
            .into_iter()
            .map(|(name, state, status)| ModuleHealth {
                name,
                state,
                status,
            })
            .collect();

        let overall_status = aggregate_status(&modules);
        let uptime_secs = self.start_time.elapsed().as_secs();

        // Update uptime metric
        if self.config.metrics.enabled {
            use logpost_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: overall_status,
            uptime_secs,
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    #[allow(dead_code)] // Public API for introspection
    pub fn config(&self) -> &LogpostConfig {
        &self.config
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.count()
    }
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create file (prevents TOCTOU races)
/// - Verifies the created file is a regular file (prevents symlink attacks)
/// - Creates parent directory with restrictive permissions (0o700)
///
/// # Errors
///
/// Returns an error if the PID file cannot be written.
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    // Create parent directory with restrictive permissions (0o700)
    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    // Atomically create file only if it doesn't exist (eliminates TOCTOU race)
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            // File already exists, read the existing PID for error message
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Verify the created file is a regular file (not a symlink or other special file)
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        // Remove the non-regular file and return error
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file (possible symlink attack)",
            path.display()
        ));
    }

    // Set restrictive permissions on the PID file (0o600)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        file.set_permissions(permissions)?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Drain record events when the broker publisher is disabled.
///
/// This prevents the tail pipeline from filling the record channel when
/// nothing consumes it. Records are logged but not published.
async fn drain_records(
    mut record_rx: mpsc::Receiver<RecordEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            record_result = record_rx.recv() => {
                match record_result {
                    Some(event) => {
                        tracing::debug!(
                            record_id = %event.id,
                            source = %event.source_path,
                            "record received but broker publisher disabled (record dropped)"
                        );
                    }
                    None => {
                        tracing::debug!("record channel closed, exiting drain task");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::debug!("record drain task shutting down");
                break;
            }
        }
    }
}

/// Record daemon-level metrics (build info, plugins registered).
///
/// This should be called once during orchestrator initialization.
fn record_daemon_metrics(plugin_count: usize) {
    use logpost_core::metrics as m;

    // Build info (always 1, with version label)
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    // Registered plugins count
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_PLUGINS_REGISTERED).set(plugin_count as f64);

    tracing::debug!(
        plugin_count = plugin_count,
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus scrapes.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use logpost_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
