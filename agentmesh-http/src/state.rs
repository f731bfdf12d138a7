//! Shared state handed to every route handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agentmesh_injector::DependencyInjector;
use agentmesh_tools::registry::DecoratorStore;

use crate::metrics::ServerMetrics;

/// A flag the orchestrator flips once registry connection (or a deliberate
/// no-registry startup) has completed, so `/ready` can distinguish "process
/// is up" from "process is ready to serve traffic".
#[derive(Clone, Default)]
pub struct ReadinessFlag(Arc<AtomicBool>);

impl ReadinessFlag {
    /// Creates a flag starting in the not-ready state.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Marks the process ready.
    pub fn set_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Marks the process not ready (e.g. while rewiring dependencies).
    pub fn set_not_ready(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns whether the process currently considers itself ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared across every handler: the tool registry, a readiness flag
/// the orchestrator drives, the metrics registry backing `/metrics`, and
/// (once the orchestrator has one to hand over) the dependency injector
/// tool functions reach their own dependencies through.
#[derive(Clone)]
pub struct AppState {
    /// The tool registry this server dispatches invocations into.
    pub store: Arc<DecoratorStore>,
    /// Readiness flag toggled by the owning orchestrator.
    pub readiness: ReadinessFlag,
    /// Prometheus-backed counters and histograms for this server.
    pub metrics: Arc<ServerMetrics>,
    /// Injector backing `/mcp` calls into dependent tools. `None` when the
    /// server is built without one (e.g. in tests exercising plain tools).
    pub injector: Option<Arc<DependencyInjector>>,
}

impl AppState {
    /// Builds app state around an existing tool registry, with no injector
    /// wired yet.
    #[must_use]
    pub fn new(store: Arc<DecoratorStore>) -> Self {
        Self {
            store,
            readiness: ReadinessFlag::new(),
            metrics: Arc::new(ServerMetrics::new()),
            injector: None,
        }
    }

    /// Attaches the dependency injector tool functions dispatched through
    /// this state can reach their resolved dependencies through.
    #[must_use]
    pub fn with_injector(mut self, injector: Arc<DependencyInjector>) -> Self {
        self.injector = Some(injector);
        self
    }
}
