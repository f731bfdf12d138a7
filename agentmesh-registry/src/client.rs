//! The registry client: register, heartbeat, and discovery calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::http_client::{build_https_client, HyperClient};
use crate::wire::{AgentList, AgentRecord, HeartbeatRequest, HeartbeatResponse};

/// Result alias for registry client operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by [`RegistryClient`] operations. Every variant is a
/// typed, recoverable failure: the client never panics on a bad response,
/// and network failures after backoff is exhausted are reported here rather
/// than propagated as a process-ending error.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The client was closed and will not issue further requests.
    #[error("registry client is closed")]
    Closed,

    /// The request could not be built (invalid URL, bad header, etc.).
    #[error("invalid registry request: {reason}")]
    InvalidRequest {
        /// Human-readable reason.
        reason: String,
    },

    /// The request failed at the transport layer after exhausting retries.
    #[error("registry request failed after {attempts} attempt(s): {reason}")]
    Transport {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Underlying transport error description.
        reason: String,
    },

    /// The registry returned a non-success status code.
    #[error("registry responded with status {status}: {body}")]
    Status {
        /// HTTP status code returned.
        status: u16,
        /// Response body, if any was returned.
        body: String,
    },

    /// The response body could not be parsed as the expected JSON shape.
    #[error("invalid registry response: {reason}")]
    InvalidResponse {
        /// Human-readable reason.
        reason: String,
    },
}

/// Bounded exponential backoff applied within a single logical call.
///
/// Retries are scoped to one `register`/`send_heartbeat`/etc. invocation:
/// there is no persistent retry state carried between calls, so a caller
/// that wants retry-on-next-tick behavior (as the heartbeat loop does)
/// layers that on top by simply calling again next interval.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    /// Creates a new backoff policy.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    fn delay_for_attempt(self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let scaled = self.initial_delay.saturating_mul(1u32 << exponent);
        let capped = scaled.min(self.max_delay);
        jitter(capped)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(5), 3)
    }
}

/// Adds up to +/-25% jitter using the low bits of the current instant's
/// subsecond nanoseconds as a cheap, non-cryptographic noise source — no
/// need to pull in a dependency dedicated to randomness for this.
fn jitter(base: Duration) -> Duration {
    let nanos = std::time::Instant::now().elapsed().subsec_nanos();
    let spread = base.as_millis() as u64 / 4;
    if spread == 0 {
        return base;
    }
    let offset = u64::from(nanos) % (2 * spread + 1);
    let millis = base.as_millis() as u64;
    let adjusted = (millis + offset).saturating_sub(spread);
    Duration::from_millis(adjusted)
}

/// HTTP client for the mesh registry's registration, heartbeat, and
/// discovery endpoints.
pub struct RegistryClient {
    http: HyperClient,
    registry_url: String,
    backoff: BackoffPolicy,
    closed: AtomicBool,
}

impl RegistryClient {
    /// Creates a client pointed at `registry_url` using the default backoff
    /// policy.
    #[must_use]
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self::with_backoff(registry_url, BackoffPolicy::default())
    }

    /// Creates a client with an explicit backoff policy.
    #[must_use]
    pub fn with_backoff(registry_url: impl Into<String>, backoff: BackoffPolicy) -> Self {
        Self {
            http: build_https_client(),
            registry_url: registry_url.into(),
            backoff,
            closed: AtomicBool::new(false),
        }
    }

    /// Registers this agent with the registry.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub async fn register(&self, request: &HeartbeatRequest) -> RegistryResult<HeartbeatResponse> {
        self.post_json("/agents/register", request).await
    }

    /// Sends a heartbeat for an already-registered agent.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub async fn send_heartbeat(
        &self,
        request: &HeartbeatRequest,
    ) -> RegistryResult<HeartbeatResponse> {
        self.post_json("/agents/heartbeat", request).await
    }

    /// Fetches a single agent's record.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub async fn get_agent(&self, agent_id: &str) -> RegistryResult<AgentRecord> {
        self.get_json(&format!("/agents/{agent_id}")).await
    }

    /// Lists every agent known to the registry.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub async fn list_agents(&self) -> RegistryResult<Vec<AgentRecord>> {
        let list: AgentList = self.get_json("/agents").await?;
        Ok(list.agents)
    }

    /// Marks this client closed. Subsequent calls fail fast with
    /// [`RegistryError::Closed`] instead of issuing requests.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> RegistryResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::Closed);
        }
        Ok(())
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> RegistryResult<R>
    where
        B: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|err| RegistryError::InvalidRequest {
            reason: err.to_string(),
        })?;
        self.send_with_retry(path, Method::POST, Some(payload)).await
    }

    async fn get_json<R>(&self, path: &str) -> RegistryResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        self.send_with_retry(path, Method::GET, None).await
    }

    async fn send_with_retry<R>(
        &self,
        path: &str,
        method: Method,
        body: Option<Vec<u8>>,
    ) -> RegistryResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        self.ensure_open()?;

        let url = format!("{}{path}", self.registry_url);
        let mut last_error = String::new();

        for attempt in 0..self.backoff.max_attempts {
            if attempt > 0 {
                let delay = self.backoff.delay_for_attempt(attempt - 1);
                debug!(attempt, ?delay, %url, "retrying registry request");
                tokio::time::sleep(delay).await;
            }

            match self.try_once::<R>(&url, method.clone(), body.clone()).await {
                Ok(value) => return Ok(value),
                Err(RegistryError::Status { status, body }) => {
                    // Non-2xx responses are the registry's considered answer,
                    // not a transient failure: don't retry them.
                    return Err(RegistryError::Status { status, body });
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(attempt, error = %last_error, %url, "registry request attempt failed");
                }
            }
        }

        Err(RegistryError::Transport {
            attempts: self.backoff.max_attempts,
            reason: last_error,
        })
    }

    async fn try_once<R>(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
    ) -> RegistryResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut builder = Request::builder().method(method).uri(url);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        let request = builder
            .body(body.map_or_else(Body::empty, Body::from))
            .map_err(|err| RegistryError::InvalidRequest {
                reason: err.to_string(),
            })?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|err| RegistryError::Transport {
                attempts: 1,
                reason: err.to_string(),
            })?;

        let status = response.status();
        let body_bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|err| RegistryError::Transport {
                attempts: 1,
                reason: err.to_string(),
            })?;

        if status != StatusCode::OK {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body_bytes).into_owned(),
            });
        }

        serde_json::from_slice(&body_bytes).map_err(|err| RegistryError::InvalidResponse {
            reason: err.to_string(),
        })
    }
}
