//! The startup pipeline: collects decorators, resolves configuration,
//! prepares heartbeat material, checks for self-satisfied dependencies,
//! connects to the registry, and brings up the HTTP server — in that
//! order, so each step can rely on the ones before it having run.

use std::sync::Arc;

use agentmesh_config::{resolve_advertised_endpoint, AgentConfig};
use agentmesh_core::AgentIdentity;
use agentmesh_pipeline::{Pipeline, PipelineContext, PipelineResult, Step};
use agentmesh_registry::wire::{
    DecoratorWire, DependencyWire, HeartbeatMetadata, HeartbeatRequest,
};
use agentmesh_registry::RegistryClient;
use agentmesh_tools::registry::DecoratorStore;
use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Collects every `#[tool]`-annotated function submitted via [`inventory`]
/// into the decorator store.
pub struct DecoratorCollectionStep {
    /// The store to collect into.
    pub store: Arc<DecoratorStore>,
}

#[async_trait]
impl Step for DecoratorCollectionStep {
    fn name(&self) -> &str {
        "decorator_collection"
    }

    async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
        match self.store.collect_inventory() {
            Ok(count) => {
                let mut additions = PipelineContext::new();
                additions.insert("tools_collected", json!(count));
                PipelineResult::success(format!("collected {count} tool(s)"))
                    .with_context_additions(additions)
            }
            Err(err) => PipelineResult::failed(
                format!("decorator collection failed: {err}"),
                vec![err.to_string()],
            ),
        }
    }
}

/// Resolves this process's agent identity into the running context.
pub struct ConfigurationStep {
    /// The resolved agent identity.
    pub identity: AgentIdentity,
}

#[async_trait]
impl Step for ConfigurationStep {
    fn name(&self) -> &str {
        "configuration"
    }

    async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
        let mut additions = PipelineContext::new();
        additions.insert("agent_id", json!(self.identity.as_str()));
        PipelineResult::success(format!("resolved agent identity {}", self.identity))
            .with_context_additions(additions)
    }
}

/// Builds the decorator and capability lists a heartbeat or registration
/// request needs to carry.
pub struct HeartbeatPreparationStep {
    /// The store to read registered tools and agents from.
    pub store: Arc<DecoratorStore>,
}

#[async_trait]
impl Step for HeartbeatPreparationStep {
    fn name(&self) -> &str {
        "heartbeat_preparation"
    }

    async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
        let tools = self.store.get_tools();
        let decorators: Vec<DecoratorWire> = tools
            .iter()
            .map(|tool| DecoratorWire {
                function_name: tool.function_name().to_owned(),
                capability: tool.capability().to_owned(),
                version: tool.version().to_owned(),
                tags: tool.tags().to_vec(),
                dependencies: tool
                    .dependencies()
                    .iter()
                    .map(|dep| DependencyWire {
                        capability: dep.capability().to_owned(),
                        tags: dep.tags().to_vec(),
                        version: dep.version_constraint().map(str::to_owned),
                    })
                    .collect(),
            })
            .collect();

        let capabilities: Vec<String> = decorators.iter().map(|d| d.capability.clone()).collect();

        let mut additions = PipelineContext::new();
        additions.insert("decorators", json!(decorators));
        additions.insert("capabilities", json!(capabilities));
        PipelineResult::success(format!("prepared {} decorator(s)", decorators.len()))
            .with_context_additions(additions)
    }
}

/// Records which capabilities this process can already satisfy itself, so
/// the dependency injector can short-circuit self-dependencies the moment
/// they are reported without waiting on a network round trip.
pub struct ToolServerDiscoveryStep {
    /// The store to read the local capability set from.
    pub store: Arc<DecoratorStore>,
}

#[async_trait]
impl Step for ToolServerDiscoveryStep {
    fn name(&self) -> &str {
        "tool_server_discovery"
    }

    async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
        let mut capabilities: Vec<String> = self
            .store
            .get_tools()
            .into_iter()
            .map(|tool| tool.capability().to_owned())
            .collect();
        capabilities.sort();
        capabilities.dedup();

        let mut additions = PipelineContext::new();
        additions.insert("local_capabilities", json!(capabilities));
        PipelineResult::success(format!(
            "discovered {} locally-provided capability(ies)",
            capabilities.len()
        ))
        .with_context_additions(additions)
    }
}

/// Registers this agent with the mesh registry, if one is configured.
///
/// Optional: an agent with no registry (or an unreachable one) still comes
/// up and serves its own tools locally; the heartbeat loop keeps retrying
/// the connection afterward.
pub struct RegistryConnectionStep {
    /// The client to register through, if a registry is configured.
    pub client: Option<Arc<RegistryClient>>,
    /// The agent identity to register under.
    pub identity: AgentIdentity,
    /// The human-readable agent name.
    pub agent_name: String,
    /// The endpoint this agent will advertise, resolved ahead of startup.
    pub advertised_endpoint: Option<String>,
}

#[async_trait]
impl Step for RegistryConnectionStep {
    fn name(&self) -> &str {
        "registry_connection"
    }

    fn required(&self) -> bool {
        false
    }

    async fn execute(&self, context: &PipelineContext) -> PipelineResult {
        let Some(client) = &self.client else {
            return PipelineResult::skipped("no registry configured; running standalone");
        };

        let decorators = context
            .get("decorators")
            .cloned()
            .map(|value| serde_json::from_value(value).unwrap_or_default())
            .unwrap_or_default();
        let capabilities = context
            .get("capabilities")
            .cloned()
            .map(|value| serde_json::from_value(value).unwrap_or_default())
            .unwrap_or_default();

        let request = HeartbeatRequest {
            agent_id: self.identity.as_str().to_owned(),
            timestamp: chrono::Utc::now(),
            metadata: HeartbeatMetadata {
                name: self.agent_name.clone(),
                agent_type: "mcp_agent".to_owned(),
                namespace: None,
                endpoint: self.advertised_endpoint.clone(),
                status: "healthy".to_owned(),
                capabilities,
                uptime_seconds: 0,
                version: env!("CARGO_PKG_VERSION").to_owned(),
                decorators,
            },
        };

        match client.register(&request).await {
            Ok(response) => {
                let mut additions = PipelineContext::new();
                additions.insert(
                    "dependencies_resolved",
                    json!(response.dependencies_resolved),
                );
                info!(agent_id = %self.identity, "registered with mesh registry");
                PipelineResult::success("registered with registry").with_context_additions(additions)
            }
            Err(err) => {
                warn!(error = %err, "initial registry connection failed; will retry on heartbeat");
                PipelineResult::failed(
                    format!("registry connection failed: {err}"),
                    vec![err.to_string()],
                )
            }
        }
    }
}

/// Binds the local HTTP server's listening socket, if HTTP serving is
/// enabled, and records the socket for the orchestrator to pick up once the
/// pipeline completes (a [`Step`] cannot itself own a long-lived server
/// task).
pub struct HttpServerSetupStep {
    /// Whether HTTP serving is enabled at all.
    pub enabled: bool,
    /// Host and port to bind.
    pub bind_host: String,
    /// Port to bind (`0` lets the OS choose).
    pub bind_port: u16,
    /// Slot the bound listener is placed into for the orchestrator to take.
    pub listener_slot: Arc<Mutex<Option<TcpListener>>>,
}

#[async_trait]
impl Step for HttpServerSetupStep {
    fn name(&self) -> &str {
        "http_server_setup"
    }

    async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
        if !self.enabled {
            return PipelineResult::skipped("http serving disabled");
        }

        let address = format!("{}:{}", self.bind_host, self.bind_port);
        match TcpListener::bind(&address).await {
            Ok(listener) => {
                let bound_port = listener
                    .local_addr()
                    .map(|addr| addr.port())
                    .unwrap_or(self.bind_port);
                *self.listener_slot.lock().await = Some(listener);

                let mut additions = PipelineContext::new();
                additions.insert("http_bound_port", json!(bound_port));
                PipelineResult::success(format!("http server bound on port {bound_port}"))
                    .with_context_additions(additions)
            }
            Err(err) => PipelineResult::failed(
                format!("failed to bind http server on {address}: {err}"),
                vec![err.to_string()],
            ),
        }
    }
}

/// Computes the endpoint this agent should advertise, given the port its
/// HTTP server ends up bound to.
#[must_use]
pub fn advertised_endpoint(config: &AgentConfig, bound_port: u16) -> String {
    resolve_advertised_endpoint(config, bound_port)
}

/// Assembles the full startup pipeline in its required order.
#[must_use]
pub fn build_startup_pipeline(
    store: Arc<DecoratorStore>,
    identity: AgentIdentity,
    agent_name: String,
    registry_client: Option<Arc<RegistryClient>>,
    advertised_endpoint: Option<String>,
    http_enabled: bool,
    http_bind_host: String,
    http_bind_port: u16,
    listener_slot: Arc<Mutex<Option<TcpListener>>>,
) -> Pipeline {
    Pipeline::new("startup")
        .with_step(Arc::new(DecoratorCollectionStep {
            store: Arc::clone(&store),
        }))
        .with_step(Arc::new(ConfigurationStep {
            identity: identity.clone(),
        }))
        .with_step(Arc::new(HeartbeatPreparationStep {
            store: Arc::clone(&store),
        }))
        .with_step(Arc::new(ToolServerDiscoveryStep { store }))
        .with_step(Arc::new(RegistryConnectionStep {
            client: registry_client,
            identity,
            agent_name,
            advertised_endpoint,
        }))
        .with_step(Arc::new(HttpServerSetupStep {
            enabled: http_enabled,
            bind_host: http_bind_host,
            bind_port: http_bind_port,
            listener_slot,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decorator_collection_reports_zero_without_inventory_entries() {
        let step = DecoratorCollectionStep {
            store: Arc::new(DecoratorStore::new()),
        };
        let result = step.execute(&PipelineContext::new()).await;
        assert!(result.is_ok());
        assert_eq!(result.context_additions.get("tools_collected"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn registry_connection_is_skipped_without_a_client() {
        let step = RegistryConnectionStep {
            client: None,
            identity: AgentIdentity::generate(Some("test")),
            agent_name: "test".to_owned(),
            advertised_endpoint: None,
        };
        let result = step.execute(&PipelineContext::new()).await;
        assert!(result.is_ok());
        assert!(!step.required());
    }

    #[tokio::test]
    async fn http_server_setup_binds_an_ephemeral_port() {
        let slot = Arc::new(Mutex::new(None));
        let step = HttpServerSetupStep {
            enabled: true,
            bind_host: "127.0.0.1".to_owned(),
            bind_port: 0,
            listener_slot: Arc::clone(&slot),
        };
        let result = step.execute(&PipelineContext::new()).await;
        assert!(result.is_ok());
        assert!(slot.lock().await.is_some());
        let port = result
            .context_additions
            .get("http_bound_port")
            .and_then(serde_json::Value::as_u64)
            .unwrap();
        assert!(port > 0);
    }

    #[tokio::test]
    async fn http_server_setup_is_skipped_when_disabled() {
        let slot = Arc::new(Mutex::new(None));
        let step = HttpServerSetupStep {
            enabled: false,
            bind_host: "127.0.0.1".to_owned(),
            bind_port: 0,
            listener_slot: Arc::clone(&slot),
        };
        let result = step.execute(&PipelineContext::new()).await;
        assert!(result.is_ok());
        assert!(slot.lock().await.is_none());
    }
}
