//! Collapses a burst of registration events into a single downstream run.
//!
//! Every `#[tool]` registration at process startup fires the decorator
//! store's trigger hook, which calls [`DebounceCoordinator::trigger`]. A
//! module registering ten tools back-to-back would otherwise run the
//! startup pipeline ten times; instead each call resets a timer, and only
//! the last one to fire within the delay window actually runs the
//! pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Debounces repeated [`Self::trigger`] calls into a single callback
/// invocation, fired `delay` after the last call in a burst.
///
/// Implemented with a generation counter rather than cancelling a spawned
/// task: every call bumps the generation and spawns a sleeper that, once
/// the delay elapses, only runs the callback if no later call has bumped
/// the generation again in the meantime. A superseded sleeper still runs
/// to completion but does nothing — cheaper than plumbing
/// [`tokio::task::JoinHandle::abort`] through and behaviorally identical.
///
/// The callback is type-erased so a coordinator can be stored as a plain
/// field without infecting its owner with a generic parameter.
pub struct DebounceCoordinator {
    delay: Duration,
    generation: Arc<AtomicU64>,
    callback: Arc<dyn Fn() -> BoxFuture + Send + Sync>,
}

impl DebounceCoordinator {
    /// Creates a coordinator that waits `delay` after the last trigger
    /// before running `callback`.
    #[must_use]
    pub fn new<F, Fut>(delay: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            callback: Arc::new(move || Box::pin(callback()) as BoxFuture),
        }
    }

    /// Resets the debounce timer. If this is the only trigger in the delay
    /// window, the callback runs once it elapses; if another trigger
    /// follows before then, this one is superseded and never runs its
    /// callback.
    pub fn trigger(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.delay;
        let watch = Arc::clone(&self.generation);
        let callback = Arc::clone(&self.callback);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if watch.load(Ordering::SeqCst) == generation {
                debug!(generation, "debounce window elapsed; running callback");
                (callback)().await;
            } else {
                debug!(generation, "debounce trigger superseded; skipping callback");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[tokio::test]
    async fn collapses_a_burst_into_one_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let coordinator = DebounceCoordinator::new(Duration::from_millis(40), move || {
            let runs = Arc::clone(&runs_clone);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        for _ in 0..10 {
            coordinator.trigger();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn waits_at_least_the_configured_delay() {
        let started = Instant::now();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let coordinator = DebounceCoordinator::new(Duration::from_millis(200), move || {
            let fired = Arc::clone(&fired_clone);
            async move {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });

        coordinator.trigger();
        while fired.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
