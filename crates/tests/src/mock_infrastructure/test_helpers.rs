//! Helpers for driving the full relay router in-process.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use relay_core::{
    cache::TtlStore,
    config::{RouteConfig, ServerConfig, UpstreamConfig},
    proxy::RouteTable,
    types::{Chain, Network},
    upstream::HttpClient,
};
use server::{app::create_app, router::AppState};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tower::ServiceExt;

/// Builds the router for `routes`, backed by a store with the given entry lifetime.
pub fn relay_app(routes: &[RouteConfig], ttl: Duration) -> Router {
    let store = Arc::new(TtlStore::new(ttl));
    let http = Arc::new(HttpClient::new().expect("http client"));
    let table = RouteTable::from_config(routes, &store, &http).expect("valid routes");
    create_app(AppState::new(Arc::new(table), store), &ServerConfig::default())
}

#[must_use]
pub fn node(name: &str, host: &str) -> UpstreamConfig {
    UpstreamConfig::Node {
        name: name.to_string(),
        host: host.to_string(),
        username: None,
        password: None,
        timeout_ms: Some(2_000),
    }
}

#[must_use]
pub fn tagged(
    name: &str,
    template: &str,
    tags: &[(&str, &str)],
    default_tag: &str,
) -> UpstreamConfig {
    UpstreamConfig::Tagged {
        name: name.to_string(),
        base_url_template: template.to_string(),
        tag_to_secret: tags
            .iter()
            .map(|(tag, secret)| ((*tag).to_string(), (*secret).to_string()))
            .collect::<BTreeMap<_, _>>(),
        default_tag: default_tag.to_string(),
        timeout_ms: Some(2_000),
    }
}

#[must_use]
pub fn route(chain: Chain, network: Network, upstreams: Vec<UpstreamConfig>) -> RouteConfig {
    RouteConfig { chain, network, upstreams }
}

/// Sends `POST path` with a JSON body and returns the status and raw response body.
pub async fn post_rpc(app: &Router, path: &str, body: &str) -> (StatusCode, Bytes) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");

    let response = app.clone().oneshot(request).await.expect("infallible router");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    (status, body)
}

/// Parses the `error` field of a relay error body.
#[must_use]
pub fn error_message(body: &[u8]) -> String {
    let json: serde_json::Value = serde_json::from_slice(body).expect("json error body");
    json["error"].as_str().expect("error field").to_string()
}
