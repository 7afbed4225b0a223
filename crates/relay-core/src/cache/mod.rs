//! # Cache
//!
//! Response caching for the relay.
//!
//! - [`TtlStore`]: shared, namespaced key/value store with per-entry expiry and a background
//!   sweep.
//! - [`CoalescingCache`]: per-route view of the store that turns concurrent misses for the same
//!   key into a single [`Loader`] call.
//!
//! Every route owns one `CoalescingCache`; all of them share one `TtlStore`, each under its own
//! namespace.

mod background;
pub mod coalescing;
pub mod config;
pub mod fetch_guard;
pub mod store;

pub use coalescing::{CoalescingCache, Loader};
pub use config::{CacheConfig, CacheConfigError, CacheError, StoreError};
pub use fetch_guard::{FetchGuard, InflightFetch};
pub use store::{NamespaceStats, TtlStore};
