//! Aggregated health check reporting.
//!
//! The orchestrator polls each registered plugin's `health_check()` and
//! produces a unified [`DaemonHealth`] report. The overall daemon status
//! is the worst status among all modules.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use logpost_core::pipeline::HealthStatus;
use logpost_core::plugin::PluginState;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all modules).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-module health reports.
    pub modules: Vec<ModuleHealth>,
}

/// Health status for a single module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Module name (e.g., "tail-pipeline", "broker-publisher").
    pub name: String,
    /// Current lifecycle state of the module's plugin.
    pub state: PluginState,
    /// Current health status of the module.
    pub status: HealthStatus,
}

/// Aggregate multiple module health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for module in modules {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                if !worst.is_unhealthy() {
                    reasons.push(format!("{}: {}", module.name, reason));
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", module.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, status: HealthStatus) -> ModuleHealth {
        ModuleHealth {
            name: name.to_owned(),
            state: PluginState::Running,
            status,
        }
    }

    #[test]
    fn test_aggregate_all_healthy() {
        // Given: All modules report healthy
        let modules = vec![
            module("tail-pipeline", HealthStatus::Healthy),
            module("broker-publisher", HealthStatus::Healthy),
        ];

        // When: Aggregating
        let status = aggregate_status(&modules);

        // Then: Overall status is healthy
        assert!(status.is_healthy());
    }

    #[test]
    fn test_aggregate_empty_is_healthy() {
        // Given: No modules registered
        // When: Aggregating
        let status = aggregate_status(&[]);

        // Then: Overall status is healthy (nothing to be unhealthy)
        assert!(status.is_healthy());
    }

    #[test]
    fn test_aggregate_degraded_wins_over_healthy() {
        // Given: One degraded module among healthy ones
        let modules = vec![
            module("tail-pipeline", HealthStatus::Healthy),
            module(
                "broker-publisher",
                HealthStatus::Degraded("broker link connecting".to_owned()),
            ),
        ];

        // When: Aggregating
        let status = aggregate_status(&modules);

        // Then: Overall status is degraded with the module name in the reason
        match status {
            HealthStatus::Degraded(reason) => {
                assert!(reason.contains("broker-publisher"));
                assert!(reason.contains("connecting"));
            }
            other => panic!("expected degraded, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_unhealthy_wins_over_degraded() {
        // Given: Both a degraded and an unhealthy module
        let modules = vec![
            module(
                "tail-pipeline",
                HealthStatus::Degraded("channel almost full".to_owned()),
            ),
            module(
                "broker-publisher",
                HealthStatus::Unhealthy("not started".to_owned()),
            ),
        ];

        // When: Aggregating
        let status = aggregate_status(&modules);

        // Then: Overall status is unhealthy
        assert!(status.is_unhealthy());
        match status {
            HealthStatus::Unhealthy(reason) => {
                assert!(reason.contains("broker-publisher: not started"));
            }
            other => panic!("expected unhealthy, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_joins_multiple_reasons() {
        // Given: Two unhealthy modules
        let modules = vec![
            module("tail-pipeline", HealthStatus::Unhealthy("stopped".to_owned())),
            module(
                "broker-publisher",
                HealthStatus::Unhealthy("stopped".to_owned()),
            ),
        ];

        // When: Aggregating
        let status = aggregate_status(&modules);

        // Then: Both reasons appear joined with "; "
        match status {
            HealthStatus::Unhealthy(reason) => {
                assert!(reason.contains("tail-pipeline: stopped"));
                assert!(reason.contains("broker-publisher: stopped"));
                assert!(reason.contains("; "));
            }
            other => panic!("expected unhealthy, got {other:?}"),
        }
    }

    #[test]
    fn test_daemon_health_serializes_to_json() {
        // Given: A daemon health report
        let report = DaemonHealth {
            status: HealthStatus::Healthy,
            uptime_secs: 42,
            modules: vec![module("tail-pipeline", HealthStatus::Healthy)],
        };

        // When: Serializing to JSON
        let json = serde_json::to_string(&report).expect("should serialize");

        // Then: Key fields are present
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("tail-pipeline"));
    }
}
