//! Integration tests for the chain relay.
//!
//! - `relay_tests`: the full router against mockito upstreams (coalescing bursts, failover,
//!   full failure, expiry, route mapping)
//! - `config_tests`: file, `RELAY__*` and legacy environment configuration feeding real routes
//! - `mock_infrastructure`: mock upstreams and router helpers
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod relay_tests;

#[cfg(test)]
mod config_tests;

#[cfg(test)]
pub mod mock_infrastructure;
