//! # Relay Core
//!
//! Core library for the chain relay, a caching fan-in JSON-RPC proxy that sits in front of
//! Bitcoin, Bitcoin-Cash, ZCash and Ethereum full-node pools.
//!
//! This crate provides:
//!
//! - **[`cache`]**: Namespaced TTL store plus the request-coalescing cache that guarantees at most
//!   one in-flight upstream fetch per request fingerprint.
//!
//! - **[`upstream`]**: HTTP clients for direct full-node access and tagged (API-key selected)
//!   hosted endpoints.
//!
//! - **[`proxy`]**: Ordered failover across upstream clients and the per-route handler that glues
//!   fingerprinting, caching and forwarding together.
//!
//! - **[`config`]**: Layered configuration (defaults, TOML, environment).
//!
//! - **[`metrics`]**: Prometheus metrics for cache and upstream activity.
//!
//! ## Request Flow
//!
//! ```text
//! POST /<chain>/<network>
//!       │
//!       ▼
//! ┌──────────────┐
//! │ ChainHandler │ ── fingerprint(body) ──► SHA3-256 hex key
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ CoalescingCache  │ ─── Hit ──► stored bytes
//! └──────┬───────────┘
//!        │ Miss
//!        ├──────────── already in flight ──► wait for leader, re-read store
//!        │ leader
//!        ▼
//! ┌──────────────────┐
//! │  FailoverProxy   │ ── client 0 ──► client 1 ──► ... first success wins
//! └──────┬───────────┘
//!        │
//!        ▼
//!   TtlStore::put ──► release followers ──► response
//! ```

pub mod cache;
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod types;
pub mod upstream;
pub mod utils;
