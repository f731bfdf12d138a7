//! Proxy for a dependency that resolves back to a tool hosted by this same
//! process, bypassing the network entirely.

use std::sync::{Arc, Once};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use agentmesh_core::ToolProxy;
use agentmesh_tools::registry::{DecoratorStore, ToolError};

use crate::error::ProxyError;

/// Calls a locally-registered tool function directly instead of going
/// through HTTP, for the case where an agent depends on a capability it
/// happens to provide itself. Bound at construction to the local function
/// it calls.
///
/// Logs a warning the first time it is used — self-dependencies are legal
/// but usually indicate a capability naming collision worth a second look,
/// so the warning fires once per process rather than once per call.
pub struct SelfProxy {
    store: Arc<DecoratorStore>,
    function_name: String,
    capability: String,
    provider_agent_id: String,
    warned: Once,
}

impl SelfProxy {
    /// Creates a proxy that calls `function_name` in `store` directly.
    #[must_use]
    pub fn new(
        store: Arc<DecoratorStore>,
        function_name: impl Into<String>,
        capability: impl Into<String>,
        provider_agent_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            function_name: function_name.into(),
            capability: capability.into(),
            provider_agent_id: provider_agent_id.into(),
            warned: Once::new(),
        }
    }
}

#[async_trait]
impl ToolProxy for SelfProxy {
    fn capability(&self) -> &str {
        &self.capability
    }

    fn provider_agent_id(&self) -> &str {
        &self.provider_agent_id
    }

    async fn call(&self, arguments: Value) -> Result<Value, String> {
        self.warned.call_once(|| {
            warn!(
                capability = %self.capability,
                function_name = %self.function_name,
                "resolved dependency points back at this agent; calling locally"
            );
        });

        self.store
            .invoke(&self.function_name, arguments)
            .await
            .map_err(|err| match err {
                ToolError::UnknownTool { name } => {
                    ProxyError::LocalToolMissing { function_name: name }.to_string()
                }
                other => ProxyError::ToolError {
                    function_name: self.function_name.clone(),
                    message: other.to_string(),
                }
                .to_string(),
            })
    }
}
