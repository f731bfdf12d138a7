//! Wires the decorator registry, dependency injector, registry client, and
//! HTTP server into a single running agent process.
//!
//! [`Orchestrator`] is the crate's entry point: construct one from an
//! [`agentmesh_config::AgentConfig`], register tools into
//! [`Orchestrator::store`], then call [`Orchestrator::start`].

#![warn(missing_docs, clippy::pedantic)]

mod debounce;
mod error;
mod heartbeat;
mod orchestrator;
mod proxy_factory;
mod startup;

pub use debounce::DebounceCoordinator;
pub use error::{RuntimeError, RuntimeResult};
pub use heartbeat::{
    build_heartbeat_pipeline, DependencyResolutionStep, HeartbeatSendStep, DEGRADED_AFTER_FAILURES,
};
pub use orchestrator::Orchestrator;
pub use proxy_factory::RuntimeProxyFactory;
pub use startup::{
    build_startup_pipeline, advertised_endpoint, ConfigurationStep, DecoratorCollectionStep,
    HeartbeatPreparationStep, HttpServerSetupStep, RegistryConnectionStep, ToolServerDiscoveryStep,
};
