use axum::{
    extract::{rejection::BytesRejection, rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use relay_core::{
    cache::TtlStore,
    metrics::{self, MetricsCollector},
    proxy::{RelayError, RouteTable},
    types::RequestMeta,
};
use serde_json::json;
use std::{io, sync::Arc};
use tracing::{debug, warn};

/// Shared state for every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub store: Arc<TtlStore>,
    pub metrics: Option<MetricsCollector>,
}

impl AppState {
    #[must_use]
    pub fn new(routes: Arc<RouteTable>, store: Arc<TtlStore>) -> Self {
        Self { routes, store, metrics: None }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// JSON error response: `{"error": "<message>"}` with the given status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// `POST /{chain}/{network}`: relays a JSON-RPC body through the route's cache and upstreams.
///
/// The upstream response is returned byte-for-byte.
pub async fn handle_rpc(
    State(state): State<AppState>,
    Path((chain, network)): Path<(String, String)>,
    meta: Result<Query<RequestMeta>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let handler = state.routes.lookup(&chain, &network).map_err(|e| {
        debug!(chain = %chain, network = %network, error = %e, "unknown route");
        record_rejected("unknown_route");
        ApiError::from(RelayError::from(e))
    })?;

    let Query(meta) =
        meta.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;

    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text()));
        }
        Err(rejection) => {
            warn!(route = %handler.route(), error = %rejection.body_text(), "unreadable body");
            return Err(RelayError::from(io::Error::other(rejection.body_text())).into());
        }
    };

    let response = handler.handle(body, meta).await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], response).into_response())
}

#[allow(clippy::unused_async)]
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(collector) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            collector.render(),
        )
            .into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

#[allow(clippy::unused_async)]
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let routes: Vec<String> = state.routes.routes().iter().map(ToString::to_string).collect();
    let healthy = !routes.is_empty();

    let health_status = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "routes": routes,
        "cache": {
            "ttl_seconds": state.store.ttl().as_secs(),
            "namespaces": state.store.stats(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    (
        if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE },
        Json(health_status),
    )
}

#[allow(clippy::unused_async)]
pub async fn handle_not_found() -> ApiError {
    record_rejected("unknown_route");
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}

/// Records the route-level outcome for requests that never reached a handler.
pub(crate) fn record_rejected(outcome: &'static str) {
    static UNROUTED: std::sync::OnceLock<Arc<str>> = std::sync::OnceLock::new();
    metrics::record_request(UNROUTED.get_or_init(|| Arc::from("unrouted")), outcome);
}
