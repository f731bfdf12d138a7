//! Process-level gauges tracking this agent's connection to the mesh,
//! separate from the per-tool-call counters an HTTP server keeps for
//! itself.

use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};

/// Tracks registry connectivity and heartbeat health for one agent
/// process, independent of any particular HTTP server instance.
pub struct ProcessMetrics {
    registry: Registry,
    registry_connected: IntGauge,
    consecutive_heartbeat_failures: IntGauge,
    uptime_seconds: Gauge,
}

impl ProcessMetrics {
    /// Registers a fresh set of process gauges in their own registry.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        let registry = Registry::new();

        let registry_connected = IntGauge::new(
            "agentmesh_registry_connected",
            "Whether this agent currently considers itself connected to a registry (1) or not (0)",
        )
        .expect("static metric definition is valid");

        let consecutive_heartbeat_failures = IntGauge::new(
            "agentmesh_heartbeat_consecutive_failures",
            "Number of consecutive heartbeat attempts that have failed",
        )
        .expect("static metric definition is valid");

        let uptime_seconds = Gauge::new(
            "agentmesh_uptime_seconds",
            "Seconds since this agent process started",
        )
        .expect("static metric definition is valid");

        registry
            .register(Box::new(registry_connected.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(consecutive_heartbeat_failures.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(uptime_seconds.clone()))
            .expect("metric name is unique within this registry");

        Self {
            registry,
            registry_connected,
            consecutive_heartbeat_failures,
            uptime_seconds,
        }
    }

    /// Records whether the agent is currently connected to a registry.
    pub fn set_registry_connected(&self, connected: bool) {
        self.registry_connected.set(i64::from(connected));
    }

    /// Records the current consecutive-failure streak for heartbeats.
    pub fn set_consecutive_heartbeat_failures(&self, failures: u32) {
        self.consecutive_heartbeat_failures.set(i64::from(failures));
    }

    /// Records process uptime.
    pub fn set_uptime_seconds(&self, uptime: f64) {
        self.uptime_seconds.set(uptime);
    }

    /// Renders the current gauge values in Prometheus's text exposition
    /// format, for merging into an HTTP server's `/metrics` response.
    #[allow(clippy::missing_panics_doc)]
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("prometheus text encoding does not fail");
        String::from_utf8(buffer).expect("prometheus text output is valid utf-8")
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_reflects_current_gauge_values() {
        let metrics = ProcessMetrics::new();
        metrics.set_registry_connected(true);
        metrics.set_consecutive_heartbeat_failures(2);

        let rendered = metrics.render();
        assert!(rendered.contains("agentmesh_registry_connected 1"));
        assert!(rendered.contains("agentmesh_heartbeat_consecutive_failures 2"));
    }
}
