//! Namespaced in-memory key/value store with per-entry expiry.
//!
//! # Layout
//!
//! ```text
//! namespaces: DashMap<namespace, Arc<Namespace>>
//!                                   │
//!                                   └── entries: DashMap<fingerprint, StoreRecord>
//! ```
//!
//! Readers clone the namespace `Arc` out of the outer map and release its shard lock before
//! touching the inner map, so a slow reader in one namespace never holds a lock another
//! namespace needs.
//!
//! # Expiry
//!
//! An entry is visible for exactly `ttl` after its last `put`. `get` filters expired entries on
//! read, so visibility never depends on the sweep having run; the background sweep only
//! reclaims memory.

use crate::{
    cache::{
        background,
        config::{CacheConfig, CacheConfigError, StoreError},
    },
    metrics,
};
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::Instant,
};
use tracing::trace;

#[derive(Debug, Clone)]
struct StoreRecord {
    value: Bytes,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct Namespace {
    entries: DashMap<String, StoreRecord>,
}

/// Entry count for one namespace, as reported by [`TtlStore::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entries: usize,
}

/// Shared, namespaced TTL store backing every [`CoalescingCache`](super::CoalescingCache).
///
/// `get` and `put` are synchronous and never yield. Values are `Bytes`, so a hit is a
/// reference-count bump rather than a copy.
#[derive(Debug)]
pub struct TtlStore {
    namespaces: DashMap<Arc<str>, Arc<Namespace>>,
    ttl: Duration,
    max_value_bytes: usize,
}

impl TtlStore {
    /// Creates a store whose entries live for `ttl` with no size bound.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { namespaces: DashMap::new(), ttl, max_value_bytes: 0 }
    }

    /// Creates a store from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheConfigError`] if the configuration is invalid.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheConfigError> {
        config.validate()?;
        Ok(Self::new(config.ttl()).with_max_value_bytes(config.max_value_bytes))
    }

    /// Sets the per-entry size bound. `0` disables it.
    #[must_use]
    pub fn with_max_value_bytes(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = max_value_bytes;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the value stored under `(namespace, key)` if it was written less than `ttl` ago.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<Bytes> {
        let ns = self.namespace(namespace)?;
        let now = Instant::now();

        let record = ns.entries.get(key)?;
        if self.is_expired(&record, now) {
            drop(record);
            // A concurrent put may have refreshed the entry since we looked; only remove it if
            // it is still expired.
            ns.entries.remove_if(key, |_, record| self.is_expired(record, now));
            return None;
        }

        Some(record.value.clone())
    }

    /// Inserts or replaces the value under `(namespace, key)` and restarts its expiry clock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ValueTooLarge`] if the value exceeds the configured bound; the
    /// previous value, if any, is left untouched.
    pub fn put(&self, namespace: &str, key: &str, value: Bytes) -> Result<(), StoreError> {
        if self.max_value_bytes > 0 && value.len() > self.max_value_bytes {
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                limit: self.max_value_bytes,
            });
        }

        let ns = self.namespace_or_create(namespace);
        ns.entries
            .insert(key.to_string(), StoreRecord { value, inserted_at: Instant::now() });
        Ok(())
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let namespaces: Vec<Arc<Namespace>> =
            self.namespaces.iter().map(|entry| Arc::clone(entry.value())).collect();

        let mut removed = 0;
        for ns in namespaces {
            ns.entries.retain(|_, record| {
                let keep = !self.is_expired(record, now);
                if !keep {
                    removed += 1;
                }
                keep
            });
        }

        trace!(removed, "ttl store sweep");
        metrics::record_store_sweep(removed);
        removed
    }

    /// Number of stored entries in `namespace`, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self, namespace: &str) -> usize {
        self.namespace(namespace).map_or(0, |ns| ns.entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.iter().all(|entry| entry.value().entries.is_empty())
    }

    /// Per-namespace entry counts, sorted by namespace.
    #[must_use]
    pub fn stats(&self) -> Vec<NamespaceStats> {
        let mut stats: Vec<NamespaceStats> = self
            .namespaces
            .iter()
            .map(|entry| NamespaceStats {
                namespace: entry.key().to_string(),
                entries: entry.value().entries.len(),
            })
            .collect();
        stats.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        stats
    }

    /// Spawns the periodic sweep task. It runs until `shutdown_rx` fires.
    pub fn start_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            background::run_sweeper(store, interval, shutdown_rx).await;
        })
    }

    fn namespace(&self, namespace: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(namespace).map(|entry| Arc::clone(entry.value()))
    }

    fn namespace_or_create(&self, namespace: &str) -> Arc<Namespace> {
        if let Some(ns) = self.namespace(namespace) {
            return ns;
        }
        Arc::clone(self.namespaces.entry(Arc::from(namespace)).or_default().value())
    }

    fn is_expired(&self, record: &StoreRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.inserted_at) > self.ttl
    }
}
