//! Decorator registry: captures the metadata a process declares for its tool
//! functions and its agent identity, in a form the startup pipeline can
//! collect and the heartbeat pipeline can advertise.
//!
//! Tool functions are registered either through the [`agentmesh_macros::tool`]
//! attribute (collected from [`inventory`] at startup) or by calling
//! [`registry::DecoratorStore::register_tool`] directly.

#![warn(missing_docs, clippy::pedantic)]

/// Decorator storage, tool invocation, and inventory collection.
pub mod registry;

/// Re-exports the [`tool`](macros::tool) attribute macro.
pub mod macros {
    pub use agentmesh_macros::tool;
}

pub use inventory;
