//! Chooses between a local, in-process call and a remote HTTP call when
//! building a proxy for a resolved dependency.

use std::sync::Arc;

use agentmesh_core::{AgentIdentity, ToolProxy};
use agentmesh_injector::{AvailableDependency, ProxyFactory};
use agentmesh_proxy::{RemoteProxy, SelfProxy};
use agentmesh_tools::registry::DecoratorStore;

/// Builds proxies for the dependency injector, routing a dependency back to
/// [`SelfProxy`] when its provider is this very process, and to
/// [`RemoteProxy`] otherwise.
pub struct RuntimeProxyFactory {
    store: Arc<DecoratorStore>,
    identity: AgentIdentity,
}

impl RuntimeProxyFactory {
    /// Creates a factory that recognizes `identity` as "this agent".
    #[must_use]
    pub fn new(store: Arc<DecoratorStore>, identity: AgentIdentity) -> Self {
        Self { store, identity }
    }
}

impl ProxyFactory for RuntimeProxyFactory {
    fn build(&self, dependency: &AvailableDependency) -> Arc<dyn ToolProxy> {
        if dependency.provider_agent_id == self.identity.as_str() {
            Arc::new(SelfProxy::new(
                Arc::clone(&self.store),
                dependency.remote_function_name.clone(),
                dependency.capability.clone(),
                dependency.provider_agent_id.clone(),
            ))
        } else {
            Arc::new(RemoteProxy::new(
                dependency.endpoint.clone(),
                dependency.remote_function_name.clone(),
                dependency.capability.clone(),
                dependency.provider_agent_id.clone(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependency(provider: &str) -> AvailableDependency {
        AvailableDependency {
            function_name: "get_weather".into(),
            capability: "date_service".into(),
            provider_agent_id: provider.into(),
            endpoint: format!("http://{provider}:8080"),
            remote_function_name: "get_date".into(),
        }
    }

    #[test]
    fn routes_own_identity_to_self_proxy() {
        let identity = AgentIdentity::generate(Some("weather"));
        let factory = RuntimeProxyFactory::new(Arc::new(DecoratorStore::new()), identity.clone());

        let proxy = factory.build(&dependency(identity.as_str()));
        assert_eq!(proxy.provider_agent_id(), identity.as_str());
    }

    #[test]
    fn routes_other_identity_to_remote_proxy() {
        let identity = AgentIdentity::generate(Some("weather"));
        let factory = RuntimeProxyFactory::new(Arc::new(DecoratorStore::new()), identity);

        let proxy = factory.build(&dependency("date-abc123"));
        assert_eq!(proxy.provider_agent_id(), "date-abc123");
    }
}
