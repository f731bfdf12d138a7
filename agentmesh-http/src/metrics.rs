//! Prometheus counters and histograms exposed at `/metrics`.

use prometheus::{
    Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};

/// Metrics collected across the life of an HTTP server instance.
pub struct ServerMetrics {
    registry: Registry,
    calls_total: IntCounterVec,
    call_duration_seconds: HistogramVec,
}

impl ServerMetrics {
    /// Registers a fresh set of counters in their own registry.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        let registry = Registry::new();

        let calls_total = IntCounterVec::new(
            prometheus::Opts::new(
                "agentmesh_tool_calls_total",
                "Total tool invocations handled by this agent's /mcp endpoint",
            ),
            &["function_name", "outcome"],
        )
        .expect("static metric definition is valid");

        let call_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "agentmesh_tool_call_duration_seconds",
                "Tool invocation latency observed at the /mcp endpoint",
            ),
            &["function_name"],
        )
        .expect("static metric definition is valid");

        registry
            .register(Box::new(calls_total.clone()))
            .expect("metric name is unique within this registry");
        registry
            .register(Box::new(call_duration_seconds.clone()))
            .expect("metric name is unique within this registry");

        Self {
            registry,
            calls_total,
            call_duration_seconds,
        }
    }

    /// Records the outcome and duration of a single tool invocation.
    pub fn observe_call(&self, function_name: &str, outcome: &str, duration_seconds: f64) {
        self.calls_total
            .with_label_values(&[function_name, outcome])
            .inc();
        self.call_duration_seconds
            .with_label_values(&[function_name])
            .observe(duration_seconds);
    }

    /// Renders the current metric values in Prometheus's text exposition
    /// format.
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

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
