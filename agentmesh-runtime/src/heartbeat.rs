//! The heartbeat pipeline: send a heartbeat to the registry and reconcile
//! the dependency injector against whatever it reports back.
//!
//! Unlike the startup pipeline's one-shot registration, this pipeline is
//! built once and run repeatedly on a fixed interval — its steps carry
//! shared, mutable state (the consecutive-failure counter) across runs
//! rather than starting fresh each time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use agentmesh_core::AgentIdentity;
use agentmesh_injector::{AvailableDependency, DependencyInjector, ProxyFactory};
use agentmesh_pipeline::{Pipeline, PipelineContext, PipelineResult, Step};
use agentmesh_registry::wire::{HeartbeatMetadata, HeartbeatRequest};
use agentmesh_registry::RegistryClient;
use agentmesh_telemetry::ProcessMetrics;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

/// Number of consecutive heartbeat failures after which this agent reports
/// itself as `"degraded"` rather than `"healthy"` on the next attempt.
pub const DEGRADED_AFTER_FAILURES: u32 = 3;

/// Sends one heartbeat to the registry, connecting implicitly since the
/// registry client is a plain stateless HTTP client with no persistent
/// session to establish first. Tracks consecutive failures across runs so
/// the reported status can degrade after [`DEGRADED_AFTER_FAILURES`].
pub struct HeartbeatSendStep {
    /// The client to send through, if a registry is configured.
    pub client: Option<Arc<RegistryClient>>,
    /// This agent's identity.
    pub identity: AgentIdentity,
    /// Human-readable agent name.
    pub agent_name: String,
    /// Endpoint this agent advertises.
    pub advertised_endpoint: Option<String>,
    /// Tool metadata included with every heartbeat (refreshed per run in
    /// case tools were registered after startup).
    pub store: Arc<agentmesh_tools::registry::DecoratorStore>,
    /// When this process started, for `uptime_seconds`.
    pub started_at: std::time::Instant,
    /// Shared consecutive-failure counter.
    pub consecutive_failures: Arc<AtomicU32>,
    /// Process-level metrics to update with connection health.
    pub metrics: Arc<ProcessMetrics>,
}

#[async_trait]
impl Step for HeartbeatSendStep {
    fn name(&self) -> &str {
        "heartbeat_send"
    }

    async fn execute(&self, _context: &PipelineContext) -> PipelineResult {
        let Some(client) = &self.client else {
            return PipelineResult::skipped("no registry configured; nothing to heartbeat");
        };

        let failures = self.consecutive_failures.load(Ordering::SeqCst);
        let status = if failures >= DEGRADED_AFTER_FAILURES {
            "degraded"
        } else {
            "healthy"
        };

        let tools = self.store.get_tools();
        let capabilities: Vec<String> = {
            let mut caps: Vec<String> = tools.iter().map(|t| t.capability().to_owned()).collect();
            caps.sort();
            caps.dedup();
            caps
        };
        let decorators = tools
            .iter()
            .map(|tool| agentmesh_registry::wire::DecoratorWire {
                function_name: tool.function_name().to_owned(),
                capability: tool.capability().to_owned(),
                version: tool.version().to_owned(),
                tags: tool.tags().to_vec(),
                dependencies: tool
                    .dependencies()
                    .iter()
                    .map(|dep| agentmesh_registry::wire::DependencyWire {
                        capability: dep.capability().to_owned(),
                        tags: dep.tags().to_vec(),
                        version: dep.version_constraint().map(str::to_owned),
                    })
                    .collect(),
            })
            .collect();

        let request = HeartbeatRequest {
            agent_id: self.identity.as_str().to_owned(),
            timestamp: chrono::Utc::now(),
            metadata: HeartbeatMetadata {
                name: self.agent_name.clone(),
                agent_type: "mcp_agent".to_owned(),
                namespace: None,
                endpoint: self.advertised_endpoint.clone(),
                status: status.to_owned(),
                capabilities,
                uptime_seconds: self.started_at.elapsed().as_secs(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                decorators,
            },
        };

        match client.send_heartbeat(&request).await {
            Ok(response) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.metrics.set_registry_connected(true);
                self.metrics.set_consecutive_heartbeat_failures(0);

                let mut additions = PipelineContext::new();
                additions.insert(
                    "dependencies_resolved",
                    json!(response.dependencies_resolved),
                );
                PipelineResult::success("heartbeat sent").with_context_additions(additions)
            }
            Err(err) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                self.metrics.set_registry_connected(false);
                self.metrics.set_consecutive_heartbeat_failures(failures);
                warn!(error = %err, failures, "heartbeat failed");
                PipelineResult::failed(format!("heartbeat failed: {err}"), vec![err.to_string()])
            }
        }
    }
}

/// Reconciles the dependency injector against the dependency resolution
/// carried in the running context. Only runs when [`HeartbeatSendStep`]
/// succeeded (a required-step failure aborts the pipeline before this
/// step executes), which is exactly the contract
/// [`DependencyInjector::rewire`] requires: never call it with an empty
/// set just because the heartbeat itself failed.
pub struct DependencyResolutionStep {
    /// The injector to reconcile.
    pub injector: Arc<DependencyInjector>,
    /// Builds proxies for newly-resolved dependencies.
    pub factory: Arc<dyn ProxyFactory>,
}

#[async_trait]
impl Step for DependencyResolutionStep {
    fn name(&self) -> &str {
        "dependency_resolution"
    }

    async fn execute(&self, context: &PipelineContext) -> PipelineResult {
        let Some(value) = context.get("dependencies_resolved") else {
            return PipelineResult::skipped("no dependency resolution to apply");
        };

        let resolved: Vec<agentmesh_registry::wire::FunctionDependencies> =
            match serde_json::from_value(value.clone()) {
                Ok(resolved) => resolved,
                Err(err) => {
                    return PipelineResult::failed(
                        format!("invalid dependency resolution payload: {err}"),
                        vec![err.to_string()],
                    )
                }
            };

        let available: Vec<AvailableDependency> = resolved
            .into_iter()
            .flat_map(|per_function| {
                let function_name = per_function.function_name;
                per_function
                    .dependencies
                    .into_iter()
                    .filter(|dep| dep.status == "resolved")
                    .filter_map(move |dep| {
                        dep.mcp_tool_info.map(|info| AvailableDependency {
                            function_name: function_name.clone(),
                            capability: dep.capability,
                            provider_agent_id: info.agent_id,
                            endpoint: info.endpoint,
                            remote_function_name: info.name,
                        })
                    })
            })
            .collect();

        let outcome = self.injector.rewire(&available, self.factory.as_ref()).await;

        let mut additions = PipelineContext::new();
        additions.insert("rewire_outcome", json!(format!("{outcome:?}")));
        PipelineResult::success("dependency resolution applied").with_context_additions(additions)
    }
}

/// Assembles the heartbeat pipeline.
#[must_use]
pub fn build_heartbeat_pipeline(
    client: Option<Arc<RegistryClient>>,
    identity: AgentIdentity,
    agent_name: String,
    advertised_endpoint: Option<String>,
    store: Arc<agentmesh_tools::registry::DecoratorStore>,
    started_at: std::time::Instant,
    consecutive_failures: Arc<AtomicU32>,
    metrics: Arc<ProcessMetrics>,
    injector: Arc<DependencyInjector>,
    factory: Arc<dyn ProxyFactory>,
) -> Pipeline {
    Pipeline::new("heartbeat")
        .with_step(Arc::new(HeartbeatSendStep {
            client,
            identity,
            agent_name,
            advertised_endpoint,
            store,
            started_at,
            consecutive_failures,
            metrics,
        }))
        .with_step(Arc::new(DependencyResolutionStep { injector, factory }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_tools::registry::DecoratorStore;
    use std::time::Instant;

    #[tokio::test]
    async fn heartbeat_send_is_skipped_without_a_client() {
        let step = HeartbeatSendStep {
            client: None,
            identity: AgentIdentity::generate(Some("test")),
            agent_name: "test".to_owned(),
            advertised_endpoint: None,
            store: Arc::new(DecoratorStore::new()),
            started_at: Instant::now(),
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            metrics: Arc::new(ProcessMetrics::new()),
        };
        let result = step.execute(&PipelineContext::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn dependency_resolution_skips_without_prior_context() {
        let step = DependencyResolutionStep {
            injector: Arc::new(DependencyInjector::new()),
            factory: Arc::new(NoopFactory),
        };
        let result = step.execute(&PipelineContext::new()).await;
        assert!(result.is_ok());
    }

    struct NoopFactory;
    impl ProxyFactory for NoopFactory {
        fn build(&self, _dependency: &AvailableDependency) -> Arc<dyn agentmesh_core::ToolProxy> {
            unreachable!("test never supplies a dependency to build")
        }
    }
}
