//! mockito-backed upstream node.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// A mock JSON-RPC upstream with helpers for the relay's request shapes.
pub struct UpstreamMock {
    server: ServerGuard,
}

impl UpstreamMock {
    /// Starts a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await }
    }

    /// Base URL of the mock server, e.g. `http://127.0.0.1:1234`.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Answers `method` on `path` with a JSON-RPC `result`, expecting exactly `hits` calls.
    pub async fn mock_result(
        &mut self,
        path: &str,
        method: &str,
        result: Value,
        hits: usize,
    ) -> Mock {
        self.server
            .mock("POST", path)
            .match_header("content-type", "application/json")
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(rpc_response(&result))
            .expect(hits)
            .create_async()
            .await
    }

    /// Like [`Self::mock_result`] but only matches requests carrying HTTP basic auth
    /// `authorization`.
    pub async fn mock_result_with_auth(
        &mut self,
        method: &str,
        authorization: &str,
        result: Value,
        hits: usize,
    ) -> Mock {
        self.server
            .mock("POST", "/")
            .match_header("authorization", authorization)
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(rpc_response(&result))
            .expect(hits)
            .create_async()
            .await
    }

    /// Fails every request to `/` with `status`, expecting exactly `hits` calls.
    pub async fn mock_failure(&mut self, status: usize, hits: usize) -> Mock {
        self.server
            .mock("POST", "/")
            .with_status(status)
            .with_body("upstream unavailable")
            .expect(hits)
            .create_async()
            .await
    }
}

fn method_matcher(method: &str) -> Matcher {
    Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#))
}

/// The body the mock sends back for `result`.
#[must_use]
pub fn rpc_response(result: &Value) -> String {
    json!({ "jsonrpc": "1.0", "id": 1, "result": result }).to_string()
}
