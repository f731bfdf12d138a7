//! Mesh-native autonomous agent runtime SDK facade.
//!
//! Depend on this crate via `cargo add agentmesh`. It bundles the internal
//! runtime crates behind feature flags so downstream users can enable or
//! disable components as needed for their agents.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use agentmesh_core as primitives;

/// Tool registration macros (`#[tool]`), enabled by `macros`.
#[cfg(feature = "macros")]
pub use agentmesh_macros as macros;

/// Orchestrates decorator collection, registration, and heartbeats
/// (enabled by the `runtime` feature).
#[cfg(feature = "runtime")]
pub use agentmesh_runtime as runtime;

/// Tool registration and invocation (enabled by the `tools` feature).
#[cfg(feature = "tools")]
pub use agentmesh_tools as tools;

/// Environment-driven configuration (enabled by the `config` feature).
#[cfg(feature = "config")]
pub use agentmesh_config as config;

/// Tracing and Prometheus metrics (enabled by the `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use agentmesh_telemetry as telemetry;

/// Mesh registry HTTP client (enabled by the `registry` feature).
#[cfg(feature = "registry")]
pub use agentmesh_registry as registry;

/// Dependency injector and rewiring (enabled by the `injector` feature).
#[cfg(feature = "injector")]
pub use agentmesh_injector as injector;

/// HTTP serving layer (enabled by the `http` feature).
#[cfg(feature = "http")]
pub use agentmesh_http as http;

/// Sequential step pipeline (enabled by the `pipeline` feature).
#[cfg(feature = "pipeline")]
pub use agentmesh_pipeline as pipeline;

/// Local and remote tool proxies (enabled by the `proxy` feature).
#[cfg(feature = "proxy")]
pub use agentmesh_proxy as proxy;
