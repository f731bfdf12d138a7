//! Remote and self-call proxies: the concrete [`agentmesh_core::ToolProxy`]
//! implementations the dependency injector wires up once a dependency
//! resolves.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod http_client;
mod remote;
mod self_proxy;

pub use error::{ProxyError, ProxyResult};
pub use remote::RemoteProxy;
pub use self_proxy::SelfProxy;
