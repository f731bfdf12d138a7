//! Errors produced while starting or running an agent process.

use thiserror::Error;

/// Result alias for orchestrator operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors the orchestrator can fail with.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A required startup pipeline step failed; the process cannot come up.
    #[error("startup pipeline failed at step `{step}`: {message}")]
    StartupFailed {
        /// The step that aborted the run.
        step: String,
        /// The step's failure message.
        message: String,
    },

    /// The HTTP server could not be started after a successful pipeline
    /// run (the listener was not found in the expected slot).
    #[error("http server listener was not available after startup")]
    MissingListener,
}
