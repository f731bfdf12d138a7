//! The dependency injector: a live `capability -> proxy` map, kept in sync
//! with what the registry reports is available after each heartbeat.
//!
//! All mutating operations go through a single async mutex — dependency
//! resolution is infrequent (once per heartbeat interval) and never
//! contended enough to need anything finer-grained, and serializing it
//! rules out interleaved rewires racing each other.

#![warn(missing_docs, clippy::pedantic)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agentmesh_core::ToolProxy;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One dependency the registry reports as available for a given function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailableDependency {
    /// The function that declared this dependency.
    pub function_name: String,
    /// The capability being resolved.
    pub capability: String,
    /// The agent currently providing that capability.
    pub provider_agent_id: String,
    /// The HTTP endpoint to reach the provider at.
    pub endpoint: String,
    /// The function name to invoke on the provider.
    pub remote_function_name: String,
}

/// Builds a [`ToolProxy`] for a resolved dependency. Implemented outside
/// this crate (typically in the runtime crate, composing `agentmesh-proxy`)
/// so the injector never needs to know how self-dependencies differ from
/// remote ones.
pub trait ProxyFactory: Send + Sync {
    /// Builds a proxy for `dependency`.
    fn build(&self, dependency: &AvailableDependency) -> Arc<dyn ToolProxy>;
}

/// What changed as a result of a [`DependencyInjector::rewire`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RewireOutcome {
    /// The reported dependency set hashed the same as last time; nothing
    /// was touched.
    Unchanged,
    /// The dependency set changed; these capabilities were removed and
    /// these were (re-)registered.
    Rewired {
        /// Capabilities whose proxies were torn down.
        removed: Vec<String>,
        /// Capabilities now backed by a proxy.
        registered: Vec<String>,
    },
}

#[derive(Default)]
struct InjectorState {
    proxies: HashMap<String, Arc<dyn ToolProxy>>,
    dependents: HashMap<String, HashSet<String>>,
    originals: HashMap<String, Arc<dyn ToolProxy>>,
    last_fingerprint: Option<String>,
}

/// Maps capabilities to live tool proxies and keeps that map in sync with
/// what the registry reports after each heartbeat.
#[derive(Default)]
pub struct DependencyInjector {
    state: Mutex<InjectorState>,
}

impl DependencyInjector {
    /// Creates an empty injector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the proxy currently satisfying `capability`.
    pub async fn get(&self, capability: &str) -> Option<Arc<dyn ToolProxy>> {
        self.state.lock().await.proxies.get(capability).cloned()
    }

    /// Returns every capability currently wired to a proxy.
    pub async fn capabilities(&self) -> Vec<String> {
        self.state.lock().await.proxies.keys().cloned().collect()
    }

    /// Directly registers a proxy for `capability`, recording `function_name`
    /// as depending on it. Used for one-off registrations outside the
    /// heartbeat-driven rewire flow (e.g. manual wiring in tests).
    pub async fn register(
        &self,
        capability: &str,
        function_name: &str,
        proxy: Arc<dyn ToolProxy>,
    ) {
        let mut state = self.state.lock().await;
        state.proxies.insert(capability.to_owned(), proxy);
        state
            .dependents
            .entry(capability.to_owned())
            .or_default()
            .insert(function_name.to_owned());
    }

    /// Removes any proxy registered for `capability`.
    pub async fn unregister(&self, capability: &str) {
        let mut state = self.state.lock().await;
        state.proxies.remove(capability);
        state.dependents.remove(capability);
    }

    /// Temporarily replaces the proxy for `capability`, remembering the
    /// previous value so it can be recovered with [`Self::find_original`].
    /// Returns the proxy that was displaced, if any.
    pub async fn wrap(
        &self,
        capability: &str,
        replacement: Arc<dyn ToolProxy>,
    ) -> Option<Arc<dyn ToolProxy>> {
        let mut state = self.state.lock().await;
        let previous = state.proxies.insert(capability.to_owned(), replacement);
        if let Some(previous) = &previous {
            state
                .originals
                .insert(capability.to_owned(), Arc::clone(previous));
        }
        previous
    }

    /// Recovers the proxy that was displaced by the most recent
    /// [`Self::wrap`] call for `capability`, if any.
    pub async fn find_original(&self, capability: &str) -> Option<Arc<dyn ToolProxy>> {
        self.state.lock().await.originals.get(capability).cloned()
    }

    /// Reconciles the injector's wiring against what the registry reports
    /// is currently available.
    ///
    /// Capabilities no longer reported are unwired; newly reported ones get
    /// a fresh proxy from `factory`. Reporting the same dependency set as
    /// the previous call (by content hash) is a no-op. Reporting an empty
    /// set unwires everything — this is the agent-side half of a provider
    /// disappearing from the mesh.
    ///
    /// Callers are responsible for only invoking this when the registry
    /// actually answered: a failed or absent heartbeat response must leave
    /// the current wiring untouched rather than calling this with an empty
    /// list, which would incorrectly unwire every dependency.
    pub async fn rewire(
        &self,
        available: &[AvailableDependency],
        factory: &dyn ProxyFactory,
    ) -> RewireOutcome {
        let fingerprint = fingerprint_dependencies(available);

        let mut state = self.state.lock().await;
        if state.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!(fingerprint, "dependency set unchanged; skipping rewire");
            return RewireOutcome::Unchanged;
        }

        let target_capabilities: HashSet<&str> =
            available.iter().map(|dep| dep.capability.as_str()).collect();
        let current_capabilities: Vec<String> = state.proxies.keys().cloned().collect();

        let to_remove: Vec<String> = current_capabilities
            .into_iter()
            .filter(|capability| !target_capabilities.contains(capability.as_str()))
            .collect();

        for capability in &to_remove {
            state.proxies.remove(capability);
            state.dependents.remove(capability);
        }

        let mut registered = Vec::with_capacity(available.len());
        for dependency in available {
            let proxy = factory.build(dependency);
            state
                .proxies
                .insert(dependency.capability.clone(), proxy);
            state
                .dependents
                .entry(dependency.capability.clone())
                .or_default()
                .insert(dependency.function_name.clone());
            registered.push(dependency.capability.clone());
        }

        state.last_fingerprint = Some(fingerprint);

        info!(
            removed = to_remove.len(),
            registered = registered.len(),
            "dependency injector rewired"
        );

        RewireOutcome::Rewired {
            removed: to_remove,
            registered,
        }
    }
}

/// Hashes a dependency set down to a short, stable fingerprint so
/// repeat-identical heartbeat responses don't trigger needless rewiring.
/// Sixteen hex characters (64 bits) is ample collision resistance for a
/// change-detection fingerprint, not a security boundary.
fn fingerprint_dependencies(available: &[AvailableDependency]) -> String {
    let mut entries: Vec<String> = available
        .iter()
        .map(|dep| {
            format!(
                "{}|{}|{}|{}|{}",
                dep.function_name, dep.capability, dep.provider_agent_id, dep.endpoint, dep.remote_function_name
            )
        })
        .collect();
    entries.sort_unstable();

    let mut hasher = Sha256::new();
    for entry in &entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubProxy {
        capability: String,
        provider_agent_id: String,
    }

    #[async_trait]
    impl ToolProxy for StubProxy {
        fn capability(&self) -> &str {
            &self.capability
        }

        fn provider_agent_id(&self) -> &str {
            &self.provider_agent_id
        }

        async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, String> {
            Ok(arguments)
        }
    }

    struct StubFactory;

    impl ProxyFactory for StubFactory {
        fn build(&self, dependency: &AvailableDependency) -> Arc<dyn ToolProxy> {
            Arc::new(StubProxy {
                capability: dependency.capability.clone(),
                provider_agent_id: dependency.provider_agent_id.clone(),
            })
        }
    }

    fn dep(capability: &str, provider: &str) -> AvailableDependency {
        AvailableDependency {
            function_name: "get_weather".into(),
            capability: capability.into(),
            provider_agent_id: provider.into(),
            endpoint: format!("http://{provider}:8080"),
            remote_function_name: "get_date".into(),
        }
    }

    #[tokio::test]
    async fn rewire_registers_new_dependencies() {
        let injector = DependencyInjector::new();
        let outcome = injector
            .rewire(&[dep("date_service", "date-abc123")], &StubFactory)
            .await;

        assert!(matches!(outcome, RewireOutcome::Rewired { .. }));
        assert!(injector.get("date_service").await.is_some());
    }

    #[tokio::test]
    async fn rewire_is_noop_when_unchanged() {
        let injector = DependencyInjector::new();
        let deps = vec![dep("date_service", "date-abc123")];

        injector.rewire(&deps, &StubFactory).await;
        let second = injector.rewire(&deps, &StubFactory).await;

        assert_eq!(second, RewireOutcome::Unchanged);
    }

    #[tokio::test]
    async fn empty_resolution_unwires_everything() {
        let injector = DependencyInjector::new();
        injector
            .rewire(&[dep("date_service", "date-abc123")], &StubFactory)
            .await;

        let outcome = injector.rewire(&[], &StubFactory).await;
        assert!(matches!(outcome, RewireOutcome::Rewired { .. }));
        assert!(injector.get("date_service").await.is_none());
    }

    #[tokio::test]
    async fn rewire_removes_capabilities_no_longer_reported() {
        let injector = DependencyInjector::new();
        injector
            .rewire(&[dep("date_service", "date-abc123")], &StubFactory)
            .await;

        let outcome = injector
            .rewire(&[dep("weather_service", "weather-def456")], &StubFactory)
            .await;

        match outcome {
            RewireOutcome::Rewired { removed, registered } => {
                assert_eq!(removed, vec!["date_service".to_owned()]);
                assert_eq!(registered, vec!["weather_service".to_owned()]);
            }
            RewireOutcome::Unchanged => panic!("expected a rewire"),
        }
        assert!(injector.get("date_service").await.is_none());
        assert!(injector.get("weather_service").await.is_some());
    }

    #[tokio::test]
    async fn wrap_and_find_original_round_trip() {
        let injector = DependencyInjector::new();
        injector
            .register(
                "date_service",
                "get_weather",
                Arc::new(StubProxy {
                    capability: "date_service".into(),
                    provider_agent_id: "date-abc123".into(),
                }),
            )
            .await;

        let replacement = Arc::new(StubProxy {
            capability: "date_service".into(),
            provider_agent_id: "test-stub".into(),
        });
        let displaced = injector.wrap("date_service", replacement).await;
        assert!(displaced.is_some());

        let original = injector.find_original("date_service").await.unwrap();
        assert_eq!(original.provider_agent_id(), "date-abc123");
    }
}
