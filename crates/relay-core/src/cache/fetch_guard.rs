//! RAII release of a coalesced fetch.
//!
//! A [`FetchGuard`] is held by the one task that runs the loader for a key. Dropping it, on
//! success, failure, panic or cancellation alike, removes the key from the in-flight table and
//! wakes every task waiting on it.
//!
//! # Wake-up Mechanism
//!
//! Each in-flight entry owns a zero-permit [`Semaphore`]. Followers park in `acquire()`, which
//! can never succeed; the guard closes the semaphore on drop, which fails every pending and
//! future `acquire()` at once. Closing is synchronous, so the release is observable as soon as
//! `drop` returns.
//!
//! ```text
//! leader:    claim ──► load ──► store.put ──► drop(guard) ─┐
//!                                                          │ remove entry
//!                                                          │ close semaphore
//! followers: claim (occupied) ──► acquire() ... ◄──────────┘ Err(Closed) ──► store.get
//! ```

use dashmap::DashMap;
use std::sync::Arc;
use tokio::{sync::Semaphore, time::Instant};
use tracing::trace;

/// In-flight fetch for one key.
///
/// Cloning shares the underlying semaphore, which is how followers subscribe to the release.
#[derive(Debug, Clone)]
pub struct InflightFetch {
    pub(crate) semaphore: Arc<Semaphore>,
    pub started_at: Instant,
}

impl InflightFetch {
    pub(crate) fn new() -> Self {
        Self { semaphore: Arc::new(Semaphore::new(0)), started_at: Instant::now() }
    }

    /// Parks until the owning [`FetchGuard`] is dropped.
    pub(crate) async fn wait(&self) {
        // Zero permits: this only returns once the semaphore is closed.
        let _ = self.semaphore.acquire().await;
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// Exclusive right to run the loader for `key`. Releases followers on drop.
pub struct FetchGuard {
    inflight: Arc<DashMap<String, InflightFetch>>,
    key: String,
    fetch: InflightFetch,
}

impl FetchGuard {
    pub(crate) fn new(
        inflight: Arc<DashMap<String, InflightFetch>>,
        key: String,
        fetch: InflightFetch,
    ) -> Self {
        Self { inflight, key, fetch }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        // Only remove our own entry. A later wave for the same key may already own the slot.
        let own = &self.fetch.semaphore;
        self.inflight.remove_if(&self.key, |_, current| Arc::ptr_eq(&current.semaphore, own));
        own.close();
        trace!(
            key = %self.key,
            held_ms = self.fetch.started_at.elapsed().as_millis() as u64,
            "released in-flight fetch"
        );
    }
}
