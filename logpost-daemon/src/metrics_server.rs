//! Prometheus scrape endpoint for the daemon.
//!
//! Installs the global `metrics` recorder backed by
//! `metrics-exporter-prometheus` and serves `/metrics` over its built-in
//! HTTP listener. The two latency histograms are registered with the
//! bucket boundaries from `logpost_core::metrics`: classification runs
//! in microseconds while publish round-trips take milliseconds to
//! seconds, and the exporter's default buckets resolve neither range.

use std::net::SocketAddr;

use anyhow::Result;
use logpost_core::config::MetricsConfig;
use logpost_core::metrics as m;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Install the global metrics recorder and start the scrape listener.
///
/// Callable at most once per process; the `metrics` crate allows a single
/// global recorder. After this returns, every `counter!`, `gauge!`, and
/// `histogram!` invocation in the process is collected and exposed at
/// `http://{listen_addr}:{port}/metrics`.
///
/// # Errors
///
/// - `endpoint` is anything other than `/metrics` (the built-in listener
///   serves a fixed path)
/// - `listen_addr`/`port` do not form a valid socket address
/// - binding the listener or installing the recorder fails
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    tracing::info!(listen_addr = %addr, "installing Prometheus metrics recorder");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::TAIL_CLASSIFY_DURATION_SECONDS.to_owned()),
            &m::CLASSIFY_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("failed to register classify histogram buckets: {}", e))?
        .set_buckets_for_metric(
            Matcher::Full(m::PUBLISH_SEND_DURATION_SECONDS.to_owned()),
            &m::SEND_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("failed to register publish histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");

    Ok(())
}
