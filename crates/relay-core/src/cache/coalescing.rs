//! Single-flight response cache.
//!
//! # State Machine (per key)
//!
//! ```text
//!     [Absent] ──first miss──► [InFlight] ──load OK + store.put──► [Ready]
//!        ▲                         │                                 │
//!        │                     load err                              │
//!        ├─────────────────────────┘                      ttl expiry │
//!        └───────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Absent**: nothing in the store, nothing in the in-flight table.
//! - **InFlight**: one [`FetchGuard`] exists for the key; every other caller waits on it.
//! - **Ready**: the value is in the store and the in-flight entry is gone.
//!
//! # Ordering
//!
//! The leader writes the store *before* it drops its guard, and the guard removes the in-flight
//! entry before it wakes anyone. A follower woken by the release therefore always sees the
//! leader's write, and a caller arriving after the release either hits the store or becomes
//! the leader of a new wave.

use crate::{
    cache::{
        config::CacheError,
        fetch_guard::{FetchGuard, InflightFetch},
        TtlStore,
    },
    metrics,
};
use bytes::Bytes;
use dashmap::{mapref::entry::Entry, DashMap};
use std::{future::Future, sync::Arc};
use tracing::{debug, trace, warn};

/// Produces the value for a cache miss.
///
/// The cache calls [`load`](Loader::load) at most once per wave and knows nothing about what it
/// does. Any `FnOnce() -> impl Future<Output = Result<Bytes, E>>` is a loader.
pub trait Loader: Send {
    type Error: Send;

    fn load(self) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;
}

impl<F, Fut, E> Loader for F
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<Bytes, E>> + Send,
    E: Send,
{
    type Error = E;

    fn load(self) -> impl Future<Output = Result<Bytes, E>> + Send {
        self()
    }
}

enum Claim {
    Leader(FetchGuard),
    Follower(InflightFetch),
}

/// Request-coalescing cache bound to one store namespace.
///
/// Concurrent [`get`](Self::get) calls for the same key share a single loader invocation.
/// Calls for different keys never wait on each other.
pub struct CoalescingCache {
    namespace: Arc<str>,
    store: Arc<TtlStore>,
    inflight: Arc<DashMap<String, InflightFetch>>,
}

impl CoalescingCache {
    #[must_use]
    pub fn new(namespace: impl Into<Arc<str>>, store: Arc<TtlStore>) -> Self {
        Self { namespace: namespace.into(), store, inflight: Arc::new(DashMap::new()) }
    }

    #[must_use]
    pub fn namespace(&self) -> &Arc<str> {
        &self.namespace
    }

    #[must_use]
    pub fn store(&self) -> &Arc<TtlStore> {
        &self.store
    }

    /// Number of keys with a fetch currently in progress.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Returns the stored value for `key`, running `loader` if no value is stored and no other
    /// task is already loading it.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Loader`] if this task ran the loader and it failed.
    /// - [`CacheError::CoalescedFetchFailed`] if this task waited on another task's load and
    ///   no value was stored when it was released.
    pub async fn get<L: Loader>(
        &self,
        key: &str,
        loader: L,
    ) -> Result<Bytes, CacheError<L::Error>> {
        if let Some(value) = self.store.get(&self.namespace, key) {
            metrics::record_cache_hit(&self.namespace);
            trace!(namespace = %self.namespace, key, "cache hit");
            return Ok(value);
        }

        match self.claim(key) {
            Claim::Follower(fetch) => self.follow(key, fetch).await,
            Claim::Leader(guard) => self.lead(key, guard, loader).await,
        }
    }

    /// Atomically installs an in-flight entry for `key`, or returns the one already present.
    fn claim(&self, key: &str) -> Claim {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(entry) => Claim::Follower(entry.get().clone()),
            Entry::Vacant(entry) => {
                let fetch = InflightFetch::new();
                entry.insert(fetch.clone());
                Claim::Leader(FetchGuard::new(Arc::clone(&self.inflight), key.to_string(), fetch))
            }
        }
    }

    async fn lead<L: Loader>(
        &self,
        key: &str,
        guard: FetchGuard,
        loader: L,
    ) -> Result<Bytes, CacheError<L::Error>> {
        // The previous wave may have stored its value between our miss and our claim.
        if let Some(value) = self.store.get(&self.namespace, key) {
            drop(guard);
            metrics::record_cache_hit(&self.namespace);
            return Ok(value);
        }

        metrics::record_cache_miss(&self.namespace);
        debug!(namespace = %self.namespace, key, "cache miss, loading");

        let result = loader.load().await;

        let outcome = match result {
            Ok(value) => {
                if let Err(e) = self.store.put(&self.namespace, key, value.clone()) {
                    metrics::record_store_put_failure(&self.namespace);
                    warn!(namespace = %self.namespace, key, error = %e, "failed to store response");
                }
                Ok(value)
            }
            Err(e) => Err(CacheError::Loader(e)),
        };

        drop(guard);
        outcome
    }

    async fn follow<E>(&self, key: &str, fetch: InflightFetch) -> Result<Bytes, CacheError<E>> {
        metrics::record_coalesced(&self.namespace);
        trace!(namespace = %self.namespace, key, "waiting on in-flight fetch");

        fetch.wait().await;

        if let Some(value) = self.store.get(&self.namespace, key) {
            return Ok(value);
        }

        metrics::record_coalesced_failure(&self.namespace);
        debug!(namespace = %self.namespace, key, "coalesced fetch released without a value");
        Err(CacheError::CoalescedFetchFailed { key: key.to_string() })
    }
}

impl std::fmt::Debug for CoalescingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingCache")
            .field("namespace", &self.namespace)
            .field("in_flight", &self.inflight.len())
            .finish_non_exhaustive()
    }
}
