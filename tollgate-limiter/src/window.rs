//! Fixed-window request counter for a single tier.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, instrument};

use tollgate_core::error::{Result, TollgateError};
use tollgate_core::keys::limiter_key;
use tollgate_core::types::{ClientId, Decision, Quota, Tier, TierConfig};

/// Per-client counter for the current window.
#[derive(Clone, Copy, Debug)]
struct WindowCounter {
    count: u32,
    window_start: Instant,
}

impl WindowCounter {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn is_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    fn resets_in(&self, now: Instant, window: Duration) -> Duration {
        (self.window_start + window).saturating_duration_since(now)
    }
}

/// Fixed-window limiter for one tier.
///
/// Windows are tracked per client and reset lazily on the client's next
/// request, never by a global sweep. A client bursting at the end of one
/// window and the start of the next can therefore see up to twice the budget
/// within one window's length.
///
/// # Thread Safety
///
/// Each check holds the client's shard lock for the read-modify-write, so two
/// concurrent checks for one client can never both take the last slot.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    config: TierConfig,
    counters: DashMap<String, WindowCounter>,
}

impl FixedWindowLimiter {
    /// Creates a limiter for the given tier configuration.
    pub fn new(config: TierConfig) -> Self {
        Self {
            config,
            counters: DashMap::new(),
        }
    }

    /// Returns the tier this limiter guards.
    pub fn tier(&self) -> Tier {
        self.config.tier
    }

    /// Returns the tier configuration.
    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Counts one request from `client` against the current window.
    ///
    /// Fails only when the client is new and the tracker is full even after
    /// dropping elapsed windows. The fullness check and the insert are not
    /// one atomic step, so racing new clients may briefly exceed `max_clients`.
    #[instrument(level = "trace", skip_all, fields(tier = %self.config.tier, client = %client))]
    pub fn check(&self, client: &ClientId) -> Result<Decision> {
        let key = limiter_key(client, self.config.keying);
        let now = Instant::now();
        let window = self.config.window();

        if !self.counters.contains_key(&key) && self.counters.len() >= self.config.max_clients {
            let pruned = self.prune_stale(now);
            debug!(tier = %self.config.tier, pruned, "client tracker full, pruned stale windows");

            if self.counters.len() >= self.config.max_clients {
                return Err(TollgateError::TrackerFull {
                    tier: self.config.tier,
                    capacity: self.config.max_clients,
                });
            }
        }

        let mut counter = self
            .counters
            .entry(key)
            .or_insert_with(|| WindowCounter::fresh(now));

        if counter.is_elapsed(now, window) {
            *counter = WindowCounter::fresh(now);
        }

        if counter.count < self.config.max_requests {
            counter.count += 1;
            Ok(Decision::Allowed(Quota {
                limit: self.config.max_requests,
                remaining: self.config.max_requests - counter.count,
                reset_after: counter.resets_in(now, window),
            }))
        } else {
            Ok(Decision::Rejected {
                retry_after: counter.resets_in(now, window),
            })
        }
    }

    /// Returns the admitted count in the client's live window, if any.
    pub fn current_count(&self, client: &ClientId) -> Option<u32> {
        let key = limiter_key(client, self.config.keying);
        let now = Instant::now();
        self.counters
            .get(&key)
            .filter(|counter| !counter.is_elapsed(now, self.config.window()))
            .map(|counter| counter.count)
    }

    /// Returns the number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.counters.len()
    }

    /// Forgets every client.
    pub fn reset(&self) {
        self.counters.clear();
    }

    fn prune_stale(&self, now: Instant) -> usize {
        let window = self.config.window();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_elapsed(now, window));
        before.saturating_sub(self.counters.len())
    }
}
