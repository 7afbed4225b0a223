use crate::{
    middleware::{create_request_id_layers, make_request_span},
    router::{self, AppState},
};
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_core::config::ServerConfig;
use serde_json::json;
use std::any::Any;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};
use tracing::error;

/// Builds the relay router with every middleware layer applied.
///
/// Outermost first: request ID assignment, request ID propagation, tracing, CORS, panic
/// recovery, body limit, concurrency limit. There is no whole-request deadline: each upstream
/// client enforces its own timeout.
pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    let (set_request_id, propagate_request_id) = create_request_id_layers();

    Router::new()
        .route("/health", get(router::handle_health))
        .route("/metrics", get(router::handle_metrics))
        .route("/{chain}/{network}", post(router::handle_rpc))
        .fallback(router::handle_not_found)
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| make_request_span(request)),
        )
        .layer(propagate_request_id)
        .layer(set_request_id)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "request handler panicked");
    router::record_rejected("panic");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        Json(json!({ "error": "internal server error" })),
    )
        .into_response()
}
