//! Errors shared by every proxy implementation.

use thiserror::Error;

/// Result alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors a proxy call can fail with.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The remote call failed at the transport layer.
    #[error("proxy transport error calling {endpoint}: {reason}")]
    Transport {
        /// Endpoint the call was made against.
        endpoint: String,
        /// Underlying transport error description.
        reason: String,
    },

    /// The remote agent returned a non-success status code.
    #[error("proxy call to {endpoint} returned status {status}: {body}")]
    Status {
        /// Endpoint the call was made against.
        endpoint: String,
        /// HTTP status code returned.
        status: u16,
        /// Response body, if any was returned.
        body: String,
    },

    /// The remote agent reported a tool-level error (`isError: true`).
    #[error("tool `{function_name}` reported an error: {message}")]
    ToolError {
        /// Name of the function that was called.
        function_name: String,
        /// Error message reported by the tool.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid proxy response from {endpoint}: {reason}")]
    InvalidResponse {
        /// Endpoint the call was made against.
        endpoint: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A self-dependency call targeted a function the local decorator store
    /// does not know about.
    #[error("local tool `{function_name}` is not registered")]
    LocalToolMissing {
        /// Name of the missing function.
        function_name: String,
    },
}
