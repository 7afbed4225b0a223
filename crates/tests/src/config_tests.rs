//! Configuration loading, from files, `RELAY__*` overrides and the legacy per-chain variables.

use crate::mock_infrastructure::{post_rpc, relay_app, rpc_response, UpstreamMock};
use axum::http::StatusCode;
use relay_core::{
    config::{AppConfig, UpstreamConfig},
    types::{Chain, Network},
};
use serde_json::json;
use serial_test::serial;
use std::{path::PathBuf, time::Duration};

fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("relay-{}-{name}.toml", std::process::id()));
    std::fs::write(&path, contents).expect("write config");
    path
}

#[test]
#[serial]
fn test_load_reads_file_and_env_overrides() {
    let path = write_config(
        "load",
        r#"
[server]
bind_port = 9100

[cache]
ttl_seconds = 30

[[routes]]
chain = "eth"
network = "kovan"

[[routes.upstreams]]
kind = "tagged"
name = "hosted"
base_url_template = "https://eth.example/v3/{secret}"
default_tag = "default"
tag_to_secret = { default = "k1", wallet = "k2" }
"#,
    );
    std::env::set_var("RELAY_CONFIG", &path);
    std::env::set_var("RELAY__SERVER__BIND_PORT", "9200");

    let loaded = AppConfig::load();

    std::env::remove_var("RELAY_CONFIG");
    std::env::remove_var("RELAY__SERVER__BIND_PORT");
    let _ = std::fs::remove_file(&path);

    let config = loaded.expect("config loads");
    assert_eq!(config.server.bind_port, 9200);
    assert_eq!(config.cache.ttl_seconds, 30);

    let eth = config
        .routes
        .iter()
        .find(|r| r.chain == Chain::Eth)
        .expect("eth route from file");
    assert_eq!(eth.network, Network::Testnet);
    assert!(matches!(
        &eth.upstreams[0],
        UpstreamConfig::Tagged { default_tag, .. } if default_tag == "default"
    ));
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    std::env::set_var("RELAY_CONFIG", "/nonexistent/relay.toml");
    let loaded = AppConfig::load();
    std::env::remove_var("RELAY_CONFIG");

    let config = loaded.expect("defaults load");
    assert_eq!(config.server.bind_port, 8545);
    assert_eq!(config.cache.ttl_seconds, 10);
}

#[tokio::test]
async fn test_legacy_env_routes_fail_over_in_listed_order() {
    let mut broken = UpstreamMock::new().await;
    let mut healthy = UpstreamMock::new().await;
    let broken_mock = broken.mock_failure(500, 1).await;
    let healthy_mock =
        healthy.mock_result("/", "getblockchaininfo", json!({"chain": "main"}), 1).await;

    let urls = format!("{},{}", broken.url(), healthy.url());
    let config = AppConfig::default().with_legacy_routes(env(&[("BTC_MAINNET_URLS", &urls)]));
    assert!(config.validate().is_ok());

    let app = relay_app(&config.routes, Duration::from_secs(10));
    let (status, bytes) =
        post_rpc(&app, "/btc/mainnet", r#"{"id":1,"method":"getblockchaininfo"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, rpc_response(&json!({"chain": "main"})).as_bytes());
    broken_mock.assert_async().await;
    healthy_mock.assert_async().await;
}

#[tokio::test]
async fn test_legacy_kovan_template_serves_testnet() {
    let mut hosted = UpstreamMock::new().await;
    let mock = hosted.mock_result("/v3/team-secret", "eth_chainId", json!("0x2a"), 1).await;

    let template = format!("{}/v3/{{secret}}", hosted.url());
    let config = AppConfig::default().with_legacy_routes(env(&[
        ("ETH_KOVAN_URL_TEMPLATE", &template),
        ("ETH_TAG_TEAM", "team-secret"),
        ("ETH_DEFAULT_TAG", "team"),
    ]));
    assert_eq!(config.routes.len(), 1);
    assert_eq!(config.routes[0].key().to_string(), "/eth/testnet");

    let app = relay_app(&config.routes, Duration::from_secs(10));
    let (status, bytes) =
        post_rpc(&app, "/eth/kovan", r#"{"jsonrpc":"2.0","id":1,"method":"eth_chainId"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, rpc_response(&json!("0x2a")).as_bytes());
    mock.assert_async().await;
}
