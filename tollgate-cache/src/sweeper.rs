//! Background reclamation of expired entries.
//!
//! Lazy expiry on read keeps lookups correct; the sweeper bounds memory for
//! entries nobody reads again. It collects expired keys one shard at a time,
//! then removes them in small batches and yields between batches so request
//! traffic is never queued behind a full scan.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument};

use tollgate_core::constants::SWEEP_BATCH_SIZE;

use crate::cache::ResponseCache;

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a running sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper.
    pub fn shutdown(self) {
        self.handle.abort();
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a task that purges expired entries from `cache` every `period`.
///
/// The task only holds a weak reference and exits on its own once the cache
/// is dropped. Must be called from within a Tokio runtime.
pub fn spawn_sweeper<V>(cache: &Arc<ResponseCache<V>>, period: Duration) -> SweeperHandle
where
    V: Clone + Send + Sync + 'static,
{
    let period = period.max(MIN_SWEEP_PERIOD);
    let cache = Arc::downgrade(cache);

    debug!(period_secs = period.as_secs(), "starting cache sweeper");
    SweeperHandle {
        handle: tokio::spawn(run(cache, period)),
    }
}

async fn run<V>(cache: Weak<ResponseCache<V>>, period: Duration)
where
    V: Clone + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(cache) = cache.upgrade() else {
            debug!("cache dropped; sweeper exiting");
            return;
        };
        sweep(&cache).await;
    }
}

#[instrument(skip_all)]
async fn sweep<V: Clone>(cache: &ResponseCache<V>) -> usize {
    let now = Instant::now();
    let expired = cache.expired_keys(now);
    let mut removed = 0;

    for batch in expired.chunks(SWEEP_BATCH_SIZE) {
        removed += cache.remove_expired(batch, now);
        tokio::task::yield_now().await;
    }

    if removed > 0 {
        debug!(removed, remaining = cache.len(), "swept expired cache entries");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reclaims_unread_entries() {
        let cache = Arc::new(ResponseCache::new());
        cache
            .store_with_ttl("short", "1".to_string(), Duration::from_secs(10))
            .unwrap();
        cache.store("long", "2".to_string()).unwrap();
        let _sweeper = spawn_sweeper(&cache, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expired_removed, 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_in_batches() {
        let cache = ResponseCache::new();
        for i in 0..(SWEEP_BATCH_SIZE * 2 + 7) {
            cache
                .store_with_ttl(format!("k{i}"), i, Duration::from_secs(1))
                .unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(sweep(&cache).await, SWEEP_BATCH_SIZE * 2 + 7);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_exits_when_cache_dropped() {
        let cache: Arc<ResponseCache<String>> = Arc::new(ResponseCache::new());
        let sweeper = spawn_sweeper(&cache, Duration::from_secs(60));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(sweeper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeper() {
        let cache = Arc::new(ResponseCache::new());
        cache
            .store_with_ttl("k", 1u8, Duration::from_secs(1))
            .unwrap();
        spawn_sweeper(&cache, Duration::from_secs(60)).shutdown();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(cache.len(), 1);
    }
}
