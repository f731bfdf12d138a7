//! Shared error definitions for agentmesh's core value types.

use thiserror::Error;

/// Result alias used throughout the agentmesh crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating core agentmesh value types.
#[derive(Debug, Error)]
pub enum Error {
    /// A capability identifier failed validation.
    #[error("invalid capability `{capability}`: {reason}")]
    InvalidCapability {
        /// The offending capability string.
        capability: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A dependency descriptor failed validation.
    #[error("invalid dependency descriptor: {reason}")]
    InvalidDependency {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
