//! HTTP client for the mesh registry: registration, heartbeats, and agent
//! discovery, with bounded exponential backoff applied within each call.

#![warn(missing_docs, clippy::pedantic)]

mod client;
mod http_client;
/// Wire formats exchanged with the registry, including the
/// dependency-resolution shape normalizer.
pub mod wire;

pub use client::{BackoffPolicy, RegistryClient, RegistryError, RegistryResult};
