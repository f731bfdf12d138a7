//! Structured logging setup and process-level metrics shared across an
//! agent's startup, heartbeat, and serving components.

#![warn(missing_docs, clippy::pedantic)]

mod process_metrics;

pub use process_metrics::ProcessMetrics;

use tracing_subscriber::EnvFilter;

/// Installs a [`tracing_subscriber`] formatter driven by `log_level`
/// (expected to be one of `trace`/`debug`/`info`/`warn`/`error`, or any
/// valid `EnvFilter` directive string). An unparseable level falls back to
/// `info` rather than failing startup.
///
/// A `RUST_LOG` environment variable, if set, always takes precedence —
/// matching `EnvFilter`'s usual behavior — so operators can override a
/// misbehaving agent's log level without touching its configuration.
///
/// Safe to call more than once; only the first call installs a global
/// subscriber, later calls are no-ops.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}
