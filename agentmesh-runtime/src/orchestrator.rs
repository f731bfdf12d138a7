//! Ties the decorator store, dependency injector, registry client, and
//! HTTP server together into one running agent process.

use std::sync::atomic::AtomicU32;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use agentmesh_config::AgentConfig;
use agentmesh_core::{process_identity, AgentIdentity};
use agentmesh_http::AppState;
use agentmesh_injector::{DependencyInjector, ProxyFactory};
use agentmesh_pipeline::{Pipeline, PipelineContext, Step};
use agentmesh_registry::RegistryClient;
use agentmesh_telemetry::ProcessMetrics;
use agentmesh_tools::registry::DecoratorStore;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::debounce::DebounceCoordinator;
use crate::error::{RuntimeError, RuntimeResult};
use crate::heartbeat::{build_heartbeat_pipeline, DependencyResolutionStep};
use crate::proxy_factory::RuntimeProxyFactory;
use crate::startup::{advertised_endpoint, build_startup_pipeline};

/// How long [`Orchestrator::shutdown`] waits for a background task to join
/// on its own before force-cancelling it.
const SHUTDOWN_JOIN_BUDGET: Duration = Duration::from_secs(2);

/// Waits up to [`SHUTDOWN_JOIN_BUDGET`] for `handle` to finish, logging the
/// outcome either way. Force-cancels it on expiry.
async fn join_or_abort(task: &str, handle: JoinHandle<()>) {
    let abort_handle = handle.abort_handle();
    match tokio::time::timeout(SHUTDOWN_JOIN_BUDGET, handle).await {
        Ok(Ok(())) => info!(task, "background task joined cleanly during shutdown"),
        Ok(Err(err)) => error!(task, error = %err, "background task panicked during shutdown"),
        Err(_) => {
            abort_handle.abort();
            error!(
                task,
                budget_secs = SHUTDOWN_JOIN_BUDGET.as_secs(),
                "background task did not join within shutdown budget; force-cancelled"
            );
        }
    }
}

/// Owns every long-lived piece of a running agent: its tool registry,
/// dependency injector, registry connection, HTTP server, and the
/// background tasks that keep them in sync.
pub struct Orchestrator {
    config: AgentConfig,
    identity: AgentIdentity,
    agent_name: String,
    store: Arc<DecoratorStore>,
    injector: Arc<DependencyInjector>,
    registry_client: Option<Arc<RegistryClient>>,
    metrics: Arc<ProcessMetrics>,
    http_state: AppState,
    listener_slot: Arc<Mutex<Option<TcpListener>>>,
    consecutive_failures: Arc<AtomicU32>,
    started_at: Instant,
    debounce: DebounceCoordinator,
    heartbeat_pipeline: OnceLock<Pipeline>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
    http_task: Mutex<Option<JoinHandle<()>>>,
    bound_http_port: Mutex<Option<u16>>,
}

impl Orchestrator {
    /// Builds a new orchestrator from configuration. Returns an `Arc`
    /// because the debounce coordinator needs a weak self-reference to call
    /// back into [`Self::send_heartbeat_once`].
    #[must_use]
    pub fn new(config: AgentConfig) -> Arc<Self> {
        let identity = process_identity(config.agent_name.as_deref());
        let agent_name = config
            .agent_name
            .clone()
            .unwrap_or_else(|| identity.as_str().to_owned());
        let store = Arc::new(DecoratorStore::new());
        let injector = Arc::new(DependencyInjector::new());
        let registry_client = config
            .registry_url
            .as_ref()
            .map(|url| Arc::new(RegistryClient::new(url.clone())));
        let metrics = Arc::new(ProcessMetrics::new());
        let listener_slot = Arc::new(Mutex::new(None));
        let consecutive_failures = Arc::new(AtomicU32::new(0));
        let http_state = AppState::new(Arc::clone(&store)).with_injector(Arc::clone(&injector));
        let debounce_delay = config.debounce_delay;

        Arc::new_cyclic(|weak: &Weak<Orchestrator>| {
            let weak_for_debounce = weak.clone();
            let debounce = DebounceCoordinator::new(debounce_delay, move || {
                let weak = weak_for_debounce.clone();
                async move {
                    if let Some(orchestrator) = weak.upgrade() {
                        orchestrator.send_heartbeat_once().await;
                    }
                }
            });

            Self {
                config,
                identity,
                agent_name,
                store,
                injector,
                registry_client,
                metrics,
                http_state,
                listener_slot,
                consecutive_failures,
                started_at: Instant::now(),
                debounce,
                heartbeat_pipeline: OnceLock::new(),
                heartbeat_task: Mutex::new(None),
                http_task: Mutex::new(None),
                bound_http_port: Mutex::new(None),
            }
        })
    }

    /// The decorator store tool functions should be registered into before
    /// [`Self::start`] runs (or at any later point — later registrations
    /// are picked up by the debounce-triggered resync).
    #[must_use]
    pub fn store(&self) -> &Arc<DecoratorStore> {
        &self.store
    }

    /// The dependency injector backing this agent's resolved dependencies.
    #[must_use]
    pub fn injector(&self) -> &Arc<DependencyInjector> {
        &self.injector
    }

    /// This process's mesh identity.
    #[must_use]
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// The port the local HTTP server ended up bound to, once
    /// [`Self::process_once`] has run with HTTP serving enabled.
    pub async fn bound_http_port(&self) -> Option<u16> {
        *self.bound_http_port.lock().await
    }

    /// Runs the startup pipeline synchronously (from an async perspective —
    /// it completes before returning, no background loop is implied): binds
    /// the HTTP server if enabled, registers with the mesh registry if
    /// configured, and readies the heartbeat pipeline for later ticks.
    ///
    /// Installs the decorator store's trigger hook first, so that even the
    /// decorator-collection step's own registrations participate in
    /// debouncing: a burst of ten tools registering during startup
    /// collapses into at most one extra out-of-cycle heartbeat once startup
    /// settles, rather than ten.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::StartupFailed`] if a required startup step
    /// fails, or [`RuntimeError::MissingListener`] if HTTP serving was
    /// enabled but no listener ended up bound.
    pub async fn process_once(self: &Arc<Self>) -> RuntimeResult<()> {
        self.install_trigger_hook();

        let factory: Arc<dyn ProxyFactory> = Arc::new(RuntimeProxyFactory::new(
            Arc::clone(&self.store),
            self.identity.clone(),
        ));

        let pipeline = build_startup_pipeline(
            Arc::clone(&self.store),
            self.identity.clone(),
            self.agent_name.clone(),
            self.registry_client.clone(),
            None,
            self.config.http_enabled,
            self.config.http_bind_host.clone(),
            self.config.http_port,
            Arc::clone(&self.listener_slot),
        );

        let run = pipeline.run(PipelineContext::new()).await;
        if !run.completed {
            let (step, result) = run
                .step_results
                .last()
                .expect("an aborted run always has at least one result");
            return Err(RuntimeError::StartupFailed {
                step: step.clone(),
                message: result.message.clone(),
            });
        }

        DependencyResolutionStep {
            injector: Arc::clone(&self.injector),
            factory: Arc::clone(&factory),
        }
        .execute(&run.context)
        .await;

        self.bring_up_http_server(&run.context).await?;
        self.heartbeat_pipeline
            .set(build_heartbeat_pipeline(
                self.registry_client.clone(),
                self.identity.clone(),
                self.agent_name.clone(),
                self.advertised_endpoint(&run.context),
                Arc::clone(&self.store),
                self.started_at,
                Arc::clone(&self.consecutive_failures),
                Arc::clone(&self.metrics),
                Arc::clone(&self.injector),
                factory,
            ))
            .unwrap_or_else(|_| unreachable!("start() runs at most once per orchestrator"));

        self.spawn_heartbeat_loop();
        self.http_state.readiness.set_ready();

        info!(agent_id = %self.identity, "agent startup complete");

        if self.config.debug_exit {
            info!("MCP_MESH_DEBUG_EXIT set; exiting after first pipeline run");
            std::process::exit(0);
        }

        Ok(())
    }

    /// Constructs an orchestrator from `config`, runs it to completion with
    /// [`Self::process_once`], spawns the periodic heartbeat loop, and then
    /// blocks until a Ctrl-C signal is received before shutting background
    /// tasks down.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::process_once`]'s errors.
    pub async fn start_service(config: AgentConfig) -> RuntimeResult<()> {
        let orchestrator = Self::new(config);
        orchestrator.process_once().await?;

        info!("agent running; waiting for shutdown signal");
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");

        orchestrator.shutdown().await;
        Ok(())
    }

    /// Shuts down the background heartbeat and HTTP serving tasks, giving
    /// each up to [`SHUTDOWN_JOIN_BUDGET`] to finish on its own before
    /// force-cancelling it.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.heartbeat_task.lock().await.take() {
            join_or_abort("heartbeat", handle).await;
        }
        if let Some(handle) = self.http_task.lock().await.take() {
            join_or_abort("http", handle).await;
        }
    }

    fn advertised_endpoint(&self, context: &PipelineContext) -> Option<String> {
        if !self.config.http_enabled {
            return None;
        }
        let bound_port = context
            .get("http_bound_port")
            .and_then(Value::as_u64)
            .map(|port| port as u16)?;
        Some(advertised_endpoint(&self.config, bound_port))
    }

    async fn bring_up_http_server(&self, context: &PipelineContext) -> RuntimeResult<()> {
        if !self.config.http_enabled {
            return Ok(());
        }

        let listener = self
            .listener_slot
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::MissingListener)?;

        if let Ok(addr) = listener.local_addr() {
            *self.bound_http_port.lock().await = Some(addr.port());
        }

        let router = agentmesh_http::build_router(self.http_state.clone(), false);
        let endpoint = self.advertised_endpoint(context);
        info!(?endpoint, "http server listening");

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                error!(error = %err, "http server exited with an error");
            }
        });
        *self.http_task.lock().await = Some(handle);
        Ok(())
    }

    fn install_trigger_hook(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.store.set_trigger_hook(Arc::new(move || {
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.debounce.trigger();
            }
        }));
    }

    fn spawn_heartbeat_loop(self: &Arc<Self>) {
        let Some(_) = &self.registry_client else {
            return;
        };

        let orchestrator = Arc::clone(self);
        let interval_duration = self.config.heartbeat_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // first tick fires immediately; skip it, start() already registered

            loop {
                interval.tick().await;
                orchestrator.send_heartbeat_once().await;
            }
        });

        tokio::spawn({
            let orchestrator = Arc::clone(self);
            async move {
                *orchestrator.heartbeat_task.lock().await = Some(handle);
            }
        });
    }

    /// Runs the heartbeat pipeline once, outside its regular schedule.
    /// Called by the periodic loop and by the debounce coordinator after a
    /// burst of registrations settles.
    async fn send_heartbeat_once(&self) {
        if let Some(pipeline) = self.heartbeat_pipeline.get() {
            pipeline.run(PipelineContext::new()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_without_a_registry_or_http_server() {
        let mut config = AgentConfig::default();
        config.http_enabled = false;
        config.registry_url = None;

        let orchestrator = Orchestrator::new(config);
        orchestrator.process_once().await.unwrap();
        assert!(orchestrator.store().get_tools().is_empty());
    }

    #[tokio::test]
    async fn starts_http_server_on_an_ephemeral_port() {
        let mut config = AgentConfig::default();
        config.http_enabled = true;
        config.http_bind_host = "127.0.0.1".to_owned();
        config.http_port = 0;
        config.registry_url = None;

        let orchestrator = Orchestrator::new(config);
        orchestrator.process_once().await.unwrap();
    }
}
