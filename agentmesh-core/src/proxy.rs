//! The proxy abstraction shared between the dependency injector and its
//! concrete proxy implementations, so neither crate depends on the other.

use async_trait::async_trait;
use serde_json::Value;

/// Something that can stand in for a remote or local tool function once a
/// dependency has resolved. Implemented by the remote/self proxy types in
/// `agentmesh-proxy`; stored and wired up by the dependency injector.
#[async_trait]
pub trait ToolProxy: Send + Sync {
    /// The capability this proxy satisfies.
    fn capability(&self) -> &str;

    /// The agent that owns the concrete tool behind this proxy.
    fn provider_agent_id(&self) -> &str;

    /// Invokes the function this proxy is bound to (fixed at construction
    /// time — see `RemoteProxy::new`/`SelfProxy::new` in `agentmesh-proxy`)
    /// with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error description if the call fails (a transport failure
    /// for a remote proxy, or a lookup failure for a self proxy).
    async fn call(&self, arguments: Value) -> Result<Value, String>;
}
