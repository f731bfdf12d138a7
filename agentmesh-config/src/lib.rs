//! Environment-driven configuration for agent processes: registry
//! connection details, heartbeat and debounce timing, and the local HTTP
//! server's bind and advertisement settings.

#![warn(missing_docs, clippy::pedantic)]

mod address;
mod env;

pub use address::resolve_advertised_endpoint;

use std::time::Duration;

/// Configuration for a single agent process, assembled from environment
/// variables with sensible defaults. Nothing here fails to load: an
/// unparseable value is logged and replaced with its default.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Name this agent should register under. `None` lets the runtime
    /// generate one (see [`agentmesh_core::AgentIdentity`]).
    pub agent_name: Option<String>,
    /// Base URL of the registry to connect to. `None` runs the agent in
    /// standalone mode with no registry connection.
    pub registry_url: Option<String>,
    /// Interval between heartbeats while connected to a registry.
    pub heartbeat_interval: Duration,
    /// Whether to start the local HTTP server at all.
    pub http_enabled: bool,
    /// Host the HTTP server binds to.
    pub http_bind_host: String,
    /// Port the HTTP server binds to. Defaults to `8080`; `0` lets the OS
    /// choose an ephemeral one instead.
    pub http_port: u16,
    /// Host to advertise to the registry instead of auto-detecting one.
    pub http_advertise_host: Option<String>,
    /// Full endpoint override (scheme, host, and port) advertised as-is,
    /// taking priority over every other address-resolution source.
    pub http_endpoint_override: Option<String>,
    /// Value of the `HOST` environment variable, if set.
    pub host_env: Option<String>,
    /// Value of the `POD_IP` environment variable, if set.
    pub pod_ip: Option<String>,
    /// Delay the debounce coordinator waits after the last registration
    /// before running the startup pipeline.
    pub debounce_delay: Duration,
    /// Log level passed to the tracing subscriber's env filter.
    pub log_level: String,
    /// When set, causes the process to exit immediately after the startup
    /// pipeline completes instead of serving — used by test harnesses that
    /// only care whether startup itself succeeds.
    pub debug_exit: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: None,
            registry_url: None,
            heartbeat_interval: Duration::from_secs(30),
            http_enabled: true,
            http_bind_host: "0.0.0.0".to_owned(),
            http_port: 8080,
            http_advertise_host: None,
            http_endpoint_override: None,
            host_env: None,
            pod_ip: None,
            debounce_delay: Duration::from_secs_f64(1.0),
            log_level: "info".to_owned(),
            debug_exit: false,
        }
    }
}

impl AgentConfig {
    /// Loads configuration from the process environment, falling back to
    /// defaults field-by-field on any unparseable value.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            agent_name: env::string("MCP_MESH_AGENT_NAME"),
            registry_url: env::string("MCP_MESH_REGISTRY_URL"),
            heartbeat_interval: env::seconds_with_default("MCP_MESH_HEARTBEAT_INTERVAL", 30.0),
            http_enabled: env::bool_with_default("MCP_MESH_HTTP_ENABLED", true),
            http_bind_host: env::string_with_default("MCP_MESH_HTTP_HOST", "0.0.0.0"),
            http_port: env::u16_with_default("MCP_MESH_HTTP_PORT", 8080),
            http_advertise_host: env::string("MCP_MESH_HTTP_HOST")
                .filter(|host| host != "0.0.0.0"),
            http_endpoint_override: env::string("MCP_MESH_HTTP_ENDPOINT"),
            host_env: env::string("HOST"),
            pod_ip: env::string("POD_IP"),
            debounce_delay: env::seconds_with_default("MCP_MESH_DEBOUNCE_DELAY", 1.0),
            log_level: env::string_with_default("MCP_MESH_LOG_LEVEL", "info"),
            debug_exit: env::bool_with_default("MCP_MESH_DEBUG_EXIT", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane_when_environment_is_empty() {
        let config = AgentConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.debounce_delay, Duration::from_secs_f64(1.0));
        assert!(config.http_enabled);
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn from_env_reads_overrides() {
        std::env::set_var("MCP_MESH_AGENT_NAME", "weather-agent");
        std::env::set_var("MCP_MESH_HEARTBEAT_INTERVAL", "5");
        std::env::set_var("MCP_MESH_HTTP_PORT", "8080");

        let config = AgentConfig::from_env();
        assert_eq!(config.agent_name.as_deref(), Some("weather-agent"));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.http_port, 8080);

        std::env::remove_var("MCP_MESH_AGENT_NAME");
        std::env::remove_var("MCP_MESH_HEARTBEAT_INTERVAL");
        std::env::remove_var("MCP_MESH_HTTP_PORT");
    }
}
