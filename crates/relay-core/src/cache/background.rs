//! Background maintenance for the TTL store.
//!
//! The sweeper follows the same lifecycle as every other background task in the relay:
//! spawned once at startup, runs until the shutdown broadcast fires.

use crate::cache::TtlStore;
use std::sync::Arc;
use tokio::{
    sync::broadcast,
    time::{Duration, MissedTickBehavior},
};
use tracing::{debug, info};

/// Runs the periodic expiry sweep until `shutdown_rx` fires.
///
/// The first sweep happens one `interval` after start, not immediately.
pub(crate) async fn run_sweeper(
    store: Arc<TtlStore>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(interval_ms = interval.as_millis() as u64, "starting ttl store sweeper");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!("ttl store sweeper shutting down");
                break;
            }

            _ = ticker.tick() => {
                let removed = store.sweep();
                if removed > 0 {
                    debug!(removed, remaining = ?store.stats(), "swept expired entries");
                }
            }
        }
    }
}
