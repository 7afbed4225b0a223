use crate::{
    cache::{CoalescingCache, TtlStore},
    metrics,
    proxy::{errors::RelayError, failover::FailoverProxy},
    types::{RequestMeta, RouteKey},
    utils::fingerprint,
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Serves one `(chain, network)` route: fingerprint, coalesce, forward.
///
/// Every chain family uses this same type; only the route key, the cache namespace and the
/// upstream list differ.
#[derive(Debug)]
pub struct ChainHandler {
    route: RouteKey,
    label: Arc<str>,
    cache: CoalescingCache,
    proxy: Arc<FailoverProxy>,
}

impl ChainHandler {
    /// Creates a handler whose cache lives in `store` under the route's namespace.
    #[must_use]
    pub fn new(route: RouteKey, store: Arc<TtlStore>, proxy: FailoverProxy) -> Self {
        Self {
            route,
            label: Arc::from(route.to_string()),
            cache: CoalescingCache::new(route.namespace(), store),
            proxy: Arc::new(proxy),
        }
    }

    #[must_use]
    pub fn route(&self) -> RouteKey {
        self.route
    }

    #[must_use]
    pub fn cache(&self) -> &CoalescingCache {
        &self.cache
    }

    #[must_use]
    pub fn proxy(&self) -> &FailoverProxy {
        &self.proxy
    }

    /// Returns the response for `body`, from the cache or from the first healthy upstream.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Upstream`] if this request fetched and every upstream failed.
    /// - [`RelayError::CoalescedFetchFailed`] if this request waited on an identical in-flight
    ///   request that did not produce a response.
    #[instrument(skip_all, fields(route = %self.label))]
    pub async fn handle(&self, body: Bytes, meta: RequestMeta) -> Result<Bytes, RelayError> {
        let key = fingerprint(&body);
        debug!(fingerprint = %key, body_len = body.len(), "relaying request");

        let proxy = Arc::clone(&self.proxy);
        let result = self
            .cache
            .get(&key, move || async move { proxy.forward(body, &meta).await })
            .await
            .map_err(RelayError::from);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        metrics::record_request(&self.label, outcome);
        result
    }
}
