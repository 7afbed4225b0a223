//! # Proxy
//!
//! Request path from route to upstream.
//!
//! - [`RouteTable`]: resolves `/<chain>/<network>` to a [`ChainHandler`].
//! - [`ChainHandler`]: fingerprints the body and asks the route's cache for the response,
//!   handing it a loader that calls the [`FailoverProxy`].
//! - [`FailoverProxy`]: walks the route's upstream clients in order until one succeeds.

pub mod errors;
pub mod failover;
pub mod handler;
pub mod routes;

pub use errors::{ProxyError, RelayError, UpstreamFailure};
pub use failover::FailoverProxy;
pub use handler::ChainHandler;
pub use routes::RouteTable;
