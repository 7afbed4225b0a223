//! # Metrics
//!
//! Prometheus metrics for the relay, recorded through the `metrics` facade.
//!
//! Recording functions are free functions so the cache and proxy hot paths do not need a
//! collector handle threaded through them. When no recorder is installed they are no-ops,
//! which is what unit tests see.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `relay_cache_hits_total` | counter | `namespace` |
//! | `relay_cache_misses_total` | counter | `namespace` |
//! | `relay_cache_coalesced_total` | counter | `namespace` |
//! | `relay_cache_coalesced_failures_total` | counter | `namespace` |
//! | `relay_store_put_failures_total` | counter | `namespace` |
//! | `relay_store_swept_total` | counter | |
//! | `relay_upstream_requests_total` | counter | `upstream` |
//! | `relay_upstream_errors_total` | counter | `upstream`, `error_type` |
//! | `relay_upstream_latency_seconds` | histogram | `upstream` |
//! | `relay_requests_total` | counter | `route`, `outcome` |

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn init_prometheus_recorder() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                // Another recorder already owns the global slot (tests, embedding). Render
                // from a private recorder so /metrics still answers.
                tracing::warn!(error = %e, "using fallback Prometheus recorder");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Owns the Prometheus exporter handle used by the `/metrics` endpoint.
#[derive(Clone)]
pub struct MetricsCollector {
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    /// Installs (once per process) the global Prometheus recorder and returns a collector
    /// bound to it.
    #[must_use]
    pub fn new() -> Self {
        Self { prometheus_handle: init_prometheus_recorder() }
    }

    /// Renders all recorded metrics in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn record_cache_hit(namespace: &Arc<str>) {
    counter!("relay_cache_hits_total", "namespace" => Arc::clone(namespace)).increment(1);
}

pub(crate) fn record_cache_miss(namespace: &Arc<str>) {
    counter!("relay_cache_misses_total", "namespace" => Arc::clone(namespace)).increment(1);
}

pub(crate) fn record_coalesced(namespace: &Arc<str>) {
    counter!("relay_cache_coalesced_total", "namespace" => Arc::clone(namespace)).increment(1);
}

pub(crate) fn record_coalesced_failure(namespace: &Arc<str>) {
    counter!("relay_cache_coalesced_failures_total", "namespace" => Arc::clone(namespace))
        .increment(1);
}

pub(crate) fn record_store_put_failure(namespace: &Arc<str>) {
    counter!("relay_store_put_failures_total", "namespace" => Arc::clone(namespace)).increment(1);
}

pub(crate) fn record_store_sweep(removed: usize) {
    counter!("relay_store_swept_total").increment(removed as u64);
}

pub(crate) fn record_upstream_request(upstream: &Arc<str>, latency: Duration) {
    counter!("relay_upstream_requests_total", "upstream" => Arc::clone(upstream)).increment(1);
    histogram!("relay_upstream_latency_seconds", "upstream" => Arc::clone(upstream))
        .record(latency.as_secs_f64());
}

pub(crate) fn record_upstream_error(upstream: &Arc<str>, error_type: &'static str) {
    counter!(
        "relay_upstream_errors_total",
        "upstream" => Arc::clone(upstream),
        "error_type" => error_type
    )
    .increment(1);
}

/// Records the final outcome of a routed request (`ok`, `upstream_error`, `coalesced_error`, ...).
pub fn record_request(route: &Arc<str>, outcome: &'static str) {
    counter!("relay_requests_total", "route" => Arc::clone(route), "outcome" => outcome)
        .increment(1);
}
