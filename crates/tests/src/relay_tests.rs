//! End-to-end relay behavior against mockito upstreams.

use crate::mock_infrastructure::{
    error_message, node, post_rpc, relay_app, route, rpc_response, tagged, UpstreamMock,
};
use axum::http::StatusCode;
use futures::future::join_all;
use relay_core::{
    config::UpstreamConfig,
    types::{Chain, Network},
};
use serde_json::json;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(10);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_burst_reaches_upstream_once() {
    let mut upstream = UpstreamMock::new().await;
    let mock = upstream.mock_result("/", "getblockcount", json!(812_345), 1).await;
    let app = relay_app(
        &[route(Chain::Btc, Network::Mainnet, vec![node("btc-a", &upstream.url())])],
        TTL,
    );

    let body = r#"{"jsonrpc":"1.0","id":1,"method":"getblockcount","params":[]}"#;
    let responses = join_all((0..8).map(|_| post_rpc(&app, "/btc/mainnet", body))).await;

    let expected = rpc_response(&json!(812_345));
    for (status, bytes) in responses {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, expected.as_bytes());
    }
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_burst_loads_each_body_once() {
    let mut upstream = UpstreamMock::new().await;
    let count = upstream.mock_result("/", "getblockcount", json!(2_000_000), 1).await;
    let difficulty = upstream.mock_result("/", "getdifficulty", json!(1.5), 1).await;
    let app = relay_app(
        &[route(Chain::Bch, Network::Mainnet, vec![node("bch-a", &upstream.url())])],
        TTL,
    );

    let count_body = r#"{"id":1,"method":"getblockcount","params":[]}"#;
    let difficulty_body = r#"{"id":1,"method":"getdifficulty","params":[]}"#;
    let requests = (0..8).map(|i| {
        let body = if i % 2 == 0 { count_body } else { difficulty_body };
        post_rpc(&app, "/bch/mainnet", body)
    });
    let responses = join_all(requests).await;

    for (i, (status, bytes)) in responses.into_iter().enumerate() {
        assert_eq!(status, StatusCode::OK);
        let expected =
            if i % 2 == 0 { rpc_response(&json!(2_000_000)) } else { rpc_response(&json!(1.5)) };
        assert_eq!(bytes, expected.as_bytes());
    }
    count.assert_async().await;
    difficulty.assert_async().await;
}

#[tokio::test]
async fn test_failover_to_second_upstream() {
    let mut broken = UpstreamMock::new().await;
    let mut healthy = UpstreamMock::new().await;
    let broken_mock = broken.mock_failure(503, 1).await;
    let healthy_mock = healthy.mock_result("/", "getbestblockhash", json!("00ab"), 1).await;
    let app = relay_app(
        &[route(
            Chain::Zec,
            Network::Mainnet,
            vec![node("zec-a", &broken.url()), node("zec-b", &healthy.url())],
        )],
        TTL,
    );

    let (status, bytes) =
        post_rpc(&app, "/zec/mainnet", r#"{"id":7,"method":"getbestblockhash"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, rpc_response(&json!("00ab")).as_bytes());
    broken_mock.assert_async().await;
    healthy_mock.assert_async().await;
}

#[tokio::test]
async fn test_healthy_first_upstream_skips_the_rest() {
    let mut healthy = UpstreamMock::new().await;
    let mut spare = UpstreamMock::new().await;
    let healthy_mock = healthy.mock_result("/", "getblockcount", json!(1), 1).await;
    let spare_mock = spare.mock_result("/", "getblockcount", json!(2), 0).await;
    let app = relay_app(
        &[route(
            Chain::Btc,
            Network::Testnet,
            vec![node("btc-a", &healthy.url()), node("btc-b", &spare.url())],
        )],
        TTL,
    );

    let (status, bytes) = post_rpc(&app, "/btc/testnet", r#"{"method":"getblockcount"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, rpc_response(&json!(1)).as_bytes());
    healthy_mock.assert_async().await;
    spare_mock.assert_async().await;
}

#[tokio::test]
async fn test_full_failure_is_500_and_not_cached() {
    let mut first = UpstreamMock::new().await;
    let mut second = UpstreamMock::new().await;
    let first_mock = first.mock_failure(500, 2).await;
    let second_mock = second.mock_failure(502, 2).await;
    let app = relay_app(
        &[route(
            Chain::Eth,
            Network::Mainnet,
            vec![node("eth-a", &first.url()), node("eth-b", &second.url())],
        )],
        TTL,
    );

    let body = r#"{"jsonrpc":"2.0","id":1,"method":"eth_chainId","params":[]}"#;
    for _ in 0..2 {
        let (status, bytes) = post_rpc(&app, "/eth/mainnet", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = error_message(&bytes);
        assert!(message.contains("eth-a"), "{message}");
        assert!(message.contains("eth-b"), "{message}");
        assert!(!message.contains("127.0.0.1"), "upstream address leaked: {message}");
    }

    first_mock.assert_async().await;
    second_mock.assert_async().await;
}

#[tokio::test]
async fn test_expired_entry_is_reloaded() {
    let mut upstream = UpstreamMock::new().await;
    let mock = upstream.mock_result("/", "eth_gasPrice", json!("0x3b9aca00"), 2).await;
    let app = relay_app(
        &[route(Chain::Eth, Network::Localnet, vec![node("anvil", &upstream.url())])],
        Duration::from_millis(200),
    );

    let body = r#"{"jsonrpc":"2.0","id":1,"method":"eth_gasPrice","params":[]}"#;
    let (first, _) = post_rpc(&app, "/eth/localnet", body).await;
    let (cached, _) = post_rpc(&app, "/eth/localnet", body).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(cached, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let (reloaded, bytes) = post_rpc(&app, "/eth/localnet", body).await;
    assert_eq!(reloaded, StatusCode::OK);
    assert_eq!(bytes, rpc_response(&json!("0x3b9aca00")).as_bytes());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_kovan_path_selects_secret_by_tag() {
    let mut hosted = UpstreamMock::new().await;
    let wallet = hosted.mock_result("/v3/wallet-key", "eth_blockNumber", json!("0x10"), 1).await;
    let explorer =
        hosted.mock_result("/v3/explorer-key", "eth_blockNumber", json!("0x10"), 1).await;
    let template = format!("{}/v3/{{secret}}", hosted.url());
    let app = relay_app(
        &[route(
            Chain::Eth,
            Network::Testnet,
            vec![tagged(
                "hosted-testnet",
                &template,
                &[("wallet", "wallet-key"), ("explorer", "explorer-key")],
                "wallet",
            )],
        )],
        TTL,
    );

    let body = r#"{"jsonrpc":"2.0","id":1,"method":"eth_blockNumber","params":[]}"#;
    let (status, _) = post_rpc(&app, "/eth/kovan", body).await;
    assert_eq!(status, StatusCode::OK);

    // Same body on the canonical path is served from the shared testnet namespace.
    let (status, _) = post_rpc(&app, "/eth/testnet?tag=explorer", body).await;
    assert_eq!(status, StatusCode::OK);

    let other_body = r#"{"jsonrpc":"2.0","id":2,"method":"eth_blockNumber","params":[]}"#;
    let (status, _) = post_rpc(&app, "/eth/kovan?tag=explorer", other_body).await;
    assert_eq!(status, StatusCode::OK);

    wallet.assert_async().await;
    explorer.assert_async().await;
}

#[tokio::test]
async fn test_unknown_tag_is_500() {
    let hosted = UpstreamMock::new().await;
    let template = format!("{}/v3/{{secret}}", hosted.url());
    let app = relay_app(
        &[route(
            Chain::Eth,
            Network::Mainnet,
            vec![tagged("hosted", &template, &[("default", "k")], "default")],
        )],
        TTL,
    );

    let (status, bytes) =
        post_rpc(&app, "/eth/mainnet?tag=nobody", r#"{"method":"eth_blockNumber"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_message(&bytes).contains("nobody"));
}

#[tokio::test]
async fn test_btc_node_sends_basic_auth() {
    let mut upstream = UpstreamMock::new().await;
    let mock = upstream
        .mock_result_with_auth(
            "getnetworkinfo",
            "Basic cnBjOmh1bnRlcjI=",
            json!({"version": 250_000}),
            1,
        )
        .await;
    let app = relay_app(
        &[route(
            Chain::Btc,
            Network::Mainnet,
            vec![UpstreamConfig::Node {
                name: "btc-auth".to_string(),
                host: upstream.url(),
                username: Some("rpc".to_string()),
                password: Some("hunter2".to_string()),
                timeout_ms: Some(2_000),
            }],
        )],
        TTL,
    );

    let (status, bytes) =
        post_rpc(&app, "/btc/mainnet", r#"{"id":1,"method":"getnetworkinfo"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, rpc_response(&json!({"version": 250_000})).as_bytes());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_routes_are_404() {
    let upstream = UpstreamMock::new().await;
    let app = relay_app(
        &[route(Chain::Btc, Network::Mainnet, vec![node("btc-a", &upstream.url())])],
        TTL,
    );

    for path in ["/doge/mainnet", "/btc/kovan", "/bch/mainnet"] {
        let (status, bytes) = post_rpc(&app, path, "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert!(!error_message(&bytes).is_empty());
    }
}

#[tokio::test]
async fn test_networks_do_not_share_cache_entries() {
    let mut mainnet = UpstreamMock::new().await;
    let mut testnet = UpstreamMock::new().await;
    let mainnet_mock = mainnet.mock_result("/", "getblockcount", json!(900_000), 1).await;
    let testnet_mock = testnet.mock_result("/", "getblockcount", json!(2_500_000), 1).await;
    let app = relay_app(
        &[
            route(Chain::Btc, Network::Mainnet, vec![node("main", &mainnet.url())]),
            route(Chain::Btc, Network::Testnet, vec![node("test", &testnet.url())]),
        ],
        TTL,
    );

    let body = r#"{"id":1,"method":"getblockcount"}"#;
    let (_, main_bytes) = post_rpc(&app, "/btc/mainnet", body).await;
    let (_, test_bytes) = post_rpc(&app, "/btc/testnet", body).await;

    assert_eq!(main_bytes, rpc_response(&json!(900_000)).as_bytes());
    assert_eq!(test_bytes, rpc_response(&json!(2_500_000)).as_bytes());
    mainnet_mock.assert_async().await;
    testnet_mock.assert_async().await;
}
