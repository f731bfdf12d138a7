//! HTTP serving layer: a small axum router fronting a [`DecoratorStore`]
//! with the endpoints every agent process exposes — a JSON-RPC-style tool
//! invocation endpoint plus health, readiness, liveness, and metrics probes.

#![warn(missing_docs, clippy::pedantic)]

mod handlers;
mod metrics;
mod state;

pub use handlers::build_router;
pub use metrics::ServerMetrics;
pub use state::{AppState, ReadinessFlag};
