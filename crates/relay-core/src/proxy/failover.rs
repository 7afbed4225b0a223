use crate::{
    metrics,
    proxy::errors::{ProxyError, UpstreamFailure},
    types::RequestMeta,
    upstream::UpstreamClient,
};
use bytes::Bytes;
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, warn};

/// Ordered failover across upstream clients.
///
/// Clients are tried from index 0 on every call; the first success wins. Order is the operator's
/// preference and is never shuffled. Each client gets exactly one attempt.
#[derive(Debug, Clone)]
pub struct FailoverProxy {
    clients: Arc<[Arc<dyn UpstreamClient>]>,
}

impl FailoverProxy {
    #[must_use]
    pub fn new(clients: Vec<Arc<dyn UpstreamClient>>) -> Self {
        Self { clients: clients.into() }
    }

    #[must_use]
    pub fn clients(&self) -> &[Arc<dyn UpstreamClient>] {
        &self.clients
    }

    /// Forwards `body` to the first client that answers successfully.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::NoUpstreams`] if the client list is empty.
    /// - [`ProxyError::AllUpstreamsFailed`] with every client's error, in order, if none
    ///   succeeded.
    pub async fn forward(&self, body: Bytes, meta: &RequestMeta) -> Result<Bytes, ProxyError> {
        if self.clients.is_empty() {
            return Err(ProxyError::NoUpstreams);
        }

        let mut failures = Vec::new();

        for (position, client) in self.clients.iter().enumerate() {
            let started = Instant::now();
            match client.handle(body.clone(), meta).await {
                Ok(response) => {
                    metrics::record_upstream_request(client.name(), started.elapsed());
                    if position > 0 {
                        debug!(upstream = %client.name(), position, "served by fallback upstream");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    metrics::record_upstream_error(client.name(), e.error_type());
                    warn!(
                        upstream = %client.name(),
                        position,
                        error = %e,
                        "upstream failed, trying next"
                    );
                    failures
                        .push(UpstreamFailure { upstream: Arc::clone(client.name()), error: e });
                }
            }
        }

        error!(attempts = failures.len(), "all upstreams failed");
        Err(ProxyError::AllUpstreamsFailed(failures))
    }
}
