//! Mock upstreams and router helpers for integration tests.
//!
//! ```ignore
//! use tests::mock_infrastructure::{node, relay_app, route, UpstreamMock};
//!
//! let mut upstream = UpstreamMock::new().await;
//! let mock = upstream.mock_result("/", "getblockcount", json!(800_000), 1).await;
//! let app = relay_app(&[route(Chain::Btc, Network::Mainnet, vec![node("n", &upstream.url())])], ttl);
//! ```

pub mod rpc_mock;
pub mod test_helpers;

pub use rpc_mock::{rpc_response, UpstreamMock};
pub use test_helpers::*;
