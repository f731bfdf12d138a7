//! Core value types shared by every agentmesh crate: process identity,
//! capability validation, and dependency descriptors.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod dependency;
mod error;
mod ids;
mod proxy;

/// Capability validation helpers.
pub use capability::validate_capability;
/// Dependency descriptor and its shorthand-normalizing (de)serialization.
pub use dependency::DependencyDescriptor;
/// Error type and result alias shared across the runtime.
pub use error::{Error, Result};
/// Process-wide agent identity.
pub use ids::{process_identity, AgentIdentity};
/// The shared proxy trait, implemented by `agentmesh-proxy`.
pub use proxy::ToolProxy;
