use crate::{
    cache::TtlStore,
    config::RouteConfig,
    proxy::{failover::FailoverProxy, handler::ChainHandler},
    types::{RouteError, RouteKey},
    upstream::{build_client, HttpClient, UpstreamError},
};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// Maps `/<chain>/<network>` paths to their handlers.
#[derive(Debug, Default)]
pub struct RouteTable {
    handlers: HashMap<RouteKey, Arc<ChainHandler>>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one handler per configured route, all sharing `store` and `http`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidConfig`] if any upstream cannot be constructed.
    pub fn from_config(
        routes: &[RouteConfig],
        store: &Arc<TtlStore>,
        http: &Arc<HttpClient>,
    ) -> Result<Self, UpstreamError> {
        let mut table = Self::new();
        for route in routes {
            let clients = route
                .upstreams
                .iter()
                .map(|upstream| build_client(upstream, http))
                .collect::<Result<Vec<_>, _>>()?;

            info!(
                route = %route.key(),
                upstreams = ?route.upstreams.iter().map(|u| u.name()).collect::<Vec<_>>(),
                "registered route"
            );
            table.insert(ChainHandler::new(
                route.key(),
                Arc::clone(store),
                FailoverProxy::new(clients),
            ));
        }
        Ok(table)
    }

    /// Registers `handler`, replacing any handler for the same route.
    pub fn insert(&mut self, handler: ChainHandler) {
        self.handlers.insert(handler.route(), Arc::new(handler));
    }

    /// Resolves the two path segments of a request to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the segments are not a known route or the route has no
    /// configured upstreams.
    pub fn lookup(&self, chain: &str, network: &str) -> Result<Arc<ChainHandler>, RouteError> {
        let key = RouteKey::parse(chain, network)?;
        self.handlers
            .get(&key)
            .cloned()
            .ok_or(RouteError::NotConfigured(key.chain, key.network))
    }

    /// Configured routes, sorted.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteKey> {
        let mut routes: Vec<RouteKey> = self.handlers.keys().copied().collect();
        routes.sort();
        routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
