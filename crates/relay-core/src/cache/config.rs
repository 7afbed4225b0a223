//! Configuration and error types for the cache layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`TtlStore`](super::TtlStore) writes.
///
/// Store errors never fail the request that produced the value; the coalescing cache logs them
/// and followers of the same wave observe a coalesced-fetch failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Value exceeds the configured per-entry size bound.
    #[error("value of {size} bytes exceeds store limit of {limit} bytes")]
    ValueTooLarge { size: usize, limit: usize },
}

/// Errors returned by [`CoalescingCache::get`](super::CoalescingCache::get).
///
/// `E` is the error type of the loader that was coalesced.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The loader ran in this task and failed. Never cached.
    #[error("{0}")]
    Loader(E),

    /// This task waited on another task's fetch, which released without leaving a value in the
    /// store (the leader failed, its store write was rejected, or the entry expired mid-wave).
    #[error("coalesced fetch failed for {key}: leader released without a stored response")]
    CoalescedFetchFailed { key: String },
}

impl<E> CacheError<E> {
    /// Returns `true` if this error was observed by a follower rather than the leader.
    #[must_use]
    pub fn is_coalesced(&self) -> bool {
        matches!(self, Self::CoalescedFetchFailed { .. })
    }
}

/// Invalid cache configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheConfigError {
    #[error("cache ttl must be greater than 0")]
    ZeroTtl,

    #[error("sweep interval must be greater than 0")]
    ZeroSweepInterval,
}

/// Settings for the shared TTL store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a stored response in seconds. Defaults to `10`.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Period of the background expiry sweep in seconds. Defaults to `5`.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Largest response body the store accepts, in bytes. `0` disables the bound.
    /// Defaults to 8 MiB.
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,
}

fn default_ttl_seconds() -> u64 {
    10
}

fn default_sweep_interval_seconds() -> u64 {
    5
}

fn default_max_value_bytes() -> usize {
    8 * 1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            max_value_bytes: default_max_value_bytes(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// # Errors
    ///
    /// Returns [`CacheConfigError`] if the ttl or sweep interval is zero.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.ttl_seconds == 0 {
            return Err(CacheConfigError::ZeroTtl);
        }
        if self.sweep_interval_seconds == 0 {
            return Err(CacheConfigError::ZeroSweepInterval);
        }
        Ok(())
    }
}
