//! # Upstream
//!
//! HTTP clients for the JSON-RPC endpoints behind each route.
//!
//! - [`HttpClient`]: one pooled `reqwest` client with a process-wide concurrency limit.
//! - [`UpstreamClient`]: the per-endpoint capability the failover proxy walks, implemented by
//!   [`NodeClient`] and [`TaggedClient`].

pub mod client;
pub mod errors;
pub mod http_client;

pub use client::{build_client, NodeClient, TaggedClient, UpstreamClient, SECRET_PLACEHOLDER};
pub use errors::UpstreamError;
pub use http_client::{Credentials, HttpClient, HttpClientConfig};
