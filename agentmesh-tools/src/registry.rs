//! Decorator registry: tool and agent metadata, plus the callable handles
//! needed to invoke a tool once it is registered.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use agentmesh_core::{validate_capability, DependencyDescriptor};
use agentmesh_injector::DependencyInjector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result alias for decorator registry operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Future alias produced by generated tool bindings.
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult<Value>> + Send>>;

/// Declarative binding returned by the `#[tool]` macro: metadata plus the
/// function pointer that executes the call.
#[derive(Clone)]
pub struct ToolBinding {
    metadata: ToolMetadata,
    executor: fn(Value) -> ToolFuture,
}

impl ToolBinding {
    /// Creates a new tool binding from metadata and an executor function.
    #[must_use]
    pub fn new(metadata: ToolMetadata, executor: fn(Value) -> ToolFuture) -> Self {
        Self { metadata, executor }
    }

    /// Returns the metadata associated with this binding.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }
}

/// An inventory-submitted constructor for a tool binding, collected at
/// startup by [`DecoratorStore::collect_inventory`].
pub struct InventoryTool(pub fn() -> ToolResult<ToolBinding>);

inventory::collect!(InventoryTool);

/// Metadata describing a registered tool function.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolMetadata {
    function_name: String,
    capability: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<DependencyDescriptor>,
}

impl ToolMetadata {
    /// Creates metadata for the supplied function name, capability, and
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if `function_name` or `version`
    /// is empty, or `capability` fails capability validation.
    pub fn new(
        function_name: impl Into<String>,
        capability: impl Into<String>,
        version: impl Into<String>,
    ) -> ToolResult<Self> {
        let function_name = function_name.into();
        if function_name.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "tool function_name cannot be empty".into(),
            });
        }

        let capability = capability.into();
        validate_capability(&capability).map_err(|err| ToolError::InvalidMetadata {
            reason: err.to_string(),
        })?;

        let version = version.into();
        if version.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "tool version cannot be empty".into(),
            });
        }

        Ok(Self {
            function_name,
            capability,
            version,
            description: None,
            tags: Vec::new(),
            dependencies: Vec::new(),
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches ordered tags narrowing how this tool is matched.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attaches the dependencies this tool function requires to run.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<DependencyDescriptor>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Returns the function name this metadata was registered under.
    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Returns the capability this tool provides.
    #[must_use]
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Returns the semantic version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the tags attached to this tool.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the dependencies this tool requires.
    #[must_use]
    pub fn dependencies(&self) -> &[DependencyDescriptor] {
        &self.dependencies
    }
}

/// Metadata describing the agent hosting this process's tools.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentMetadata {
    agent_name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http_port: Option<u16>,
}

impl AgentMetadata {
    /// Creates metadata for the supplied agent name and version.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if either field is empty.
    pub fn new(agent_name: impl Into<String>, version: impl Into<String>) -> ToolResult<Self> {
        let agent_name = agent_name.into();
        if agent_name.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "agent_name cannot be empty".into(),
            });
        }

        let version = version.into();
        if version.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "agent version cannot be empty".into(),
            });
        }

        Ok(Self {
            agent_name,
            version,
            description: None,
            tags: Vec::new(),
            http_host: None,
            http_port: None,
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches ordered tags describing this agent.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the host this agent's HTTP endpoint should advertise.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidMetadata`] if `host` is empty.
    pub fn with_http_host(mut self, host: impl Into<String>) -> ToolResult<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ToolError::InvalidMetadata {
                reason: "http_host cannot be empty".into(),
            });
        }
        self.http_host = Some(host);
        Ok(self)
    }

    /// Sets the port this agent's HTTP endpoint should advertise. Any `u16`
    /// value is valid, including `0` for "let the OS choose".
    #[must_use]
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port);
        self
    }

    /// Returns the agent name.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Returns the semantic version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the tags attached to this agent.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the advertised HTTP host, if set.
    #[must_use]
    pub fn http_host(&self) -> Option<&str> {
        self.http_host.as_deref()
    }

    /// Returns the advertised HTTP port, if set.
    #[must_use]
    pub fn http_port(&self) -> Option<u16> {
        self.http_port
    }
}

/// Trait implemented by tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with the given JSON input, returning JSON output.
    async fn invoke(&self, input: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value) -> ToolResult<Value> {
        (self)(input).await
    }
}

/// Handle a tool function uses to reach its own resolved dependencies at
/// call time, threaded through [`DecoratorStore::invoke_with_deps`].
///
/// Resolves to `None` rather than an error when no injector is wired (e.g. a
/// unit test calling [`ToolHandle::invoke`] directly) or when the named
/// capability has no bound proxy yet — a dependent tool decides for itself
/// whether a missing dependency is fatal.
#[derive(Clone, Default)]
pub struct DependencyContext {
    injector: Option<Arc<DependencyInjector>>,
}

impl DependencyContext {
    /// Creates a context backed by `injector`. Pass `None` to get an empty
    /// context whose [`Self::call`] always resolves to `None`.
    #[must_use]
    pub fn new(injector: Option<Arc<DependencyInjector>>) -> Self {
        Self { injector }
    }

    /// Calls the proxy currently bound to `capability` with `arguments`.
    ///
    /// Returns `None` if no injector is wired or `capability` has no bound
    /// proxy right now; `Some(Err(_))` if the proxy call itself fails.
    pub async fn call(&self, capability: &str, arguments: Value) -> Option<Result<Value, String>> {
        let proxy = self.injector.as_ref()?.get(capability).await?;
        Some(proxy.call(arguments).await)
    }
}

/// Trait implemented by tool executors that need to reach their own
/// resolved dependencies at call time — the dependency-aware counterpart of
/// [`Tool`]. A dependent tool function calls back into its own capability
/// (or another tool's) through the supplied [`DependencyContext`] rather
/// than receiving a dependency pre-bound into its closure.
#[async_trait]
pub trait DependentTool: Send + Sync {
    /// Invokes the tool with the given JSON input and dependency context.
    async fn invoke(&self, input: Value, deps: DependencyContext) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> DependentTool for F
where
    F: Send + Sync + Fn(Value, DependencyContext) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value, deps: DependencyContext) -> ToolResult<Value> {
        (self)(input, deps).await
    }
}

#[derive(Clone)]
enum Executor {
    Plain(Arc<dyn Tool>),
    Dependent(Arc<dyn DependentTool>),
}

/// Handle returned by the registry for direct invocation.
#[derive(Clone)]
pub struct ToolHandle {
    metadata: ToolMetadata,
    executor: Executor,
}

impl ToolHandle {
    /// Returns the associated metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Executes the underlying tool implementation with an empty dependency
    /// context. A dependent tool invoked this way sees every dependency
    /// call resolve to `None`, exactly as if none were wired.
    ///
    /// # Errors
    ///
    /// Propagates any [`ToolError::Execution`] returned by the underlying
    /// implementation.
    pub async fn invoke(&self, input: Value) -> ToolResult<Value> {
        self.invoke_with_deps(input, DependencyContext::default()).await
    }

    /// Executes the underlying tool implementation with `deps` available
    /// for it to call into. A plain (non-dependent) tool ignores `deps`
    /// entirely.
    ///
    /// # Errors
    ///
    /// Propagates any [`ToolError::Execution`] returned by the underlying
    /// implementation.
    pub async fn invoke_with_deps(&self, input: Value, deps: DependencyContext) -> ToolResult<Value> {
        match &self.executor {
            Executor::Plain(tool) => tool.invoke(input).await,
            Executor::Dependent(tool) => tool.invoke(input, deps).await,
        }
    }
}

/// Callback invoked after a successful registration, used to wire the
/// debounce coordinator without the store holding a hard dependency on it.
type TriggerHook = Arc<dyn Fn() + Send + Sync>;

/// Summary counts of a decorator store's contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoratorStats {
    /// Number of registered tool functions.
    pub tool_count: usize,
    /// Number of registered agent entries.
    pub agent_count: usize,
}

/// Stores the tool and agent metadata declared by this process, along with
/// the callable handles needed to invoke a registered tool.
///
/// Registration is synchronous and thread-safe. A duplicate `function_name`
/// is a hard error: two tool functions can never share a name within one
/// process, since the capability-resolution machinery keys on it.
#[derive(Default)]
pub struct DecoratorStore {
    tools: RwLock<HashMap<String, ToolHandle>>,
    agents: RwLock<Vec<AgentMetadata>>,
    on_register: RwLock<Option<TriggerHook>>,
}

impl std::fmt::Debug for DecoratorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools = self.tools.read().expect("decorator store poisoned");
        let agents = self.agents.read().expect("decorator store poisoned");
        f.debug_struct("DecoratorStore")
            .field("tools", &tools.keys().collect::<Vec<_>>())
            .field("agent_count", &agents.len())
            .finish()
    }
}

impl DecoratorStore {
    /// Creates an empty decorator store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a callback fired after every successful registration. Used
    /// to wire the debounce coordinator: the store itself never depends on
    /// it directly.
    pub fn set_trigger_hook(&self, hook: TriggerHook) {
        *self.on_register.write().expect("decorator store poisoned") = Some(hook);
    }

    fn fire_trigger(&self) {
        if let Some(hook) = self
            .on_register
            .read()
            .expect("decorator store poisoned")
            .as_ref()
        {
            hook();
        }
    }

    /// Registers a tool implementation directly, bypassing the `#[tool]`
    /// macro. Fires the trigger hook on success.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the function name is already
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register_tool<T>(&self, metadata: ToolMetadata, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        let mut tools = self.tools.write().expect("decorator store poisoned");
        let name = metadata.function_name().to_owned();
        if tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        tools.insert(
            name,
            ToolHandle {
                metadata,
                executor: Executor::Plain(Arc::new(tool)),
            },
        );
        drop(tools);

        self.fire_trigger();
        Ok(())
    }

    /// Registers a tool implementation that needs to reach its own resolved
    /// dependencies at call time. Fires the trigger hook on success.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the function name is already
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register_dependent_tool<T>(&self, metadata: ToolMetadata, tool: T) -> ToolResult<()>
    where
        T: DependentTool + 'static,
    {
        let mut tools = self.tools.write().expect("decorator store poisoned");
        let name = metadata.function_name().to_owned();
        if tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        tools.insert(
            name,
            ToolHandle {
                metadata,
                executor: Executor::Dependent(Arc::new(tool)),
            },
        );
        drop(tools);

        self.fire_trigger();
        Ok(())
    }

    /// Registers a binding produced by the `#[tool]` macro.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the binding's function name
    /// already exists within the store.
    pub fn register_binding(&self, binding: ToolBinding) -> ToolResult<()> {
        let ToolBinding { metadata, executor } = binding;
        self.register_tool(metadata, executor)
    }

    /// Registers the agent identity for this process.
    ///
    /// Fires the trigger hook on success.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateAgent`] if an agent with the same
    /// `agent_name` is already registered.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register_agent(&self, metadata: AgentMetadata) -> ToolResult<()> {
        let mut agents = self.agents.write().expect("decorator store poisoned");
        if agents
            .iter()
            .any(|existing| existing.agent_name() == metadata.agent_name())
        {
            return Err(ToolError::DuplicateAgent {
                name: metadata.agent_name().to_owned(),
            });
        }
        agents.push(metadata);
        drop(agents);

        self.fire_trigger();
        Ok(())
    }

    /// Collects every tool bound via the `#[tool]` macro and submitted to
    /// [`inventory`], registering each one.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ToolError`] raised while constructing or
    /// registering a collected binding.
    pub fn collect_inventory(&self) -> ToolResult<usize> {
        let mut count = 0;
        for entry in inventory::iter::<InventoryTool> {
            let binding = (entry.0)()?;
            self.register_binding(binding)?;
            count += 1;
        }
        Ok(count)
    }

    /// Returns a handle to the tool matching the supplied function name.
    #[must_use]
    pub fn get(&self, function_name: &str) -> Option<ToolHandle> {
        let tools = self.tools.read().ok()?;
        tools.get(function_name).cloned()
    }

    /// Invokes a registered tool directly.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the tool is not found or
    /// propagates [`ToolError::Execution`] when the implementation fails.
    pub async fn invoke(&self, function_name: &str, input: Value) -> ToolResult<Value> {
        let handle = self
            .get(function_name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: function_name.to_owned(),
            })?;
        handle.invoke(input).await
    }

    /// Invokes a registered tool with a dependency context it can call back
    /// into for its own resolved dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the tool is not found or
    /// propagates [`ToolError::Execution`] when the implementation fails.
    pub async fn invoke_with_deps(
        &self,
        function_name: &str,
        input: Value,
        deps: DependencyContext,
    ) -> ToolResult<Value> {
        let handle = self
            .get(function_name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: function_name.to_owned(),
            })?;
        handle.invoke_with_deps(input, deps).await
    }

    /// Lists the metadata of all registered tools.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get_tools(&self) -> Vec<ToolMetadata> {
        let tools = self.tools.read().expect("decorator store poisoned");
        tools.values().map(|handle| handle.metadata.clone()).collect()
    }

    /// Lists the registered agent metadata.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn get_agents(&self) -> Vec<AgentMetadata> {
        self.agents
            .read()
            .expect("decorator store poisoned")
            .clone()
    }

    /// Clears all registered tools and agents. Intended for test harnesses
    /// that need a fresh store between cases; does not fire the trigger
    /// hook.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn clear(&self) {
        self.tools.write().expect("decorator store poisoned").clear();
        self.agents.write().expect("decorator store poisoned").clear();
    }

    /// Returns summary counts of this store's contents.
    #[must_use]
    pub fn stats(&self) -> DecoratorStats {
        DecoratorStats {
            tool_count: self.tools.read().expect("decorator store poisoned").len(),
            agent_count: self.agents.read().expect("decorator store poisoned").len(),
        }
    }
}

/// Errors produced by tool and agent registration and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool or agent metadata failed validation.
    #[error("invalid metadata: {reason}")]
    InvalidMetadata {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Function name collided with an existing tool registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Function name of the offending tool.
        name: String,
    },

    /// Agent name collided with an existing agent registration.
    #[error("agent `{name}` is already registered")]
    DuplicateAgent {
        /// Name of the offending agent.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Function name of the missing tool.
        name: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }
}
