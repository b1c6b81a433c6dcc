//! In-memory TTL cache for rendered responses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use tollgate_core::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
};
use tollgate_core::error::{Result, TollgateError};
use tollgate_core::traits::CacheInvalidator;

/// Cache entry with an absolute expiry.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds
    pub default_ttl_seconds: u64,
    /// Entry bound. New keys are refused once it is reached; racing stores
    /// of distinct new keys can overshoot it by at most one per writer.
    pub max_entries: usize,
    /// Period of the background reclamation sweep in seconds
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    /// Returns the default TTL.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Returns the sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_seconds == 0 {
            return Err(TollgateError::ConfigError(
                "cache TTL must be at least one second".into(),
            ));
        }
        if self.max_entries == 0 {
            return Err(TollgateError::ConfigError(
                "cache must hold at least one entry".into(),
            ));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(TollgateError::ConfigError(
                "sweep interval must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    rejected_stores: AtomicU64,
    expired_removed: AtomicU64,
    invalidated: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: usize) {
        counter.fetch_add(by as u64, Ordering::Relaxed);
    }
}

/// In-memory cache for already-serialized responses.
///
/// Thread-safe. Each key is guarded by its shard lock, so a lookup or store
/// never observes a torn entry, while operations on different keys proceed in
/// parallel. Expired entries are treated as absent on read and removed either
/// by that read or by the background sweeper.
pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    counters: Counters,
}

impl<V: Clone> ResponseCache<V> {
    /// Creates a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            counters: Counters::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Gets a live cached value by key.
    ///
    /// An expired entry counts as a miss and is removed on the way out. Reads
    /// never extend an entry's lifetime.
    pub fn lookup(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                Counters::bump(&self.counters.hits, 1);
                trace!(key, "cache hit");
                return Some(entry.value.clone());
            }
            drop(entry);

            // Conditional so a concurrent fresh store under this key survives.
            if self
                .entries
                .remove_if(key, |_, e| e.is_expired(now))
                .is_some()
            {
                Counters::bump(&self.counters.expired_removed, 1);
                trace!(key, "removed expired entry on read");
            }
        }

        Counters::bump(&self.counters.misses, 1);
        None
    }

    /// Caches a value with the default TTL.
    pub fn store(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.store_with_ttl(key, value, self.config.default_ttl())
    }

    /// Caches a value with a custom TTL, replacing any previous entry.
    ///
    /// Fails without side effects when the TTL is zero or when the cache
    /// already holds `max_entries` and `key` is new. The check and the insert
    /// are separate steps, so the bound is soft under concurrent writers.
    pub fn store_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl).filter(|_| !ttl.is_zero()) else {
            Counters::bump(&self.counters.rejected_stores, 1);
            return Err(TollgateError::InvalidTtl);
        };

        let key = key.into();
        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(&key) {
            Counters::bump(&self.counters.rejected_stores, 1);
            return Err(TollgateError::CacheCapacityExceeded {
                capacity: self.config.max_entries,
            });
        }

        self.entries.insert(key, CacheEntry { value, expires_at });
        Counters::bump(&self.counters.stores, 1);
        Ok(())
    }

    /// Removes every entry whose key contains `pattern`.
    ///
    /// Returns the number of live entries removed; expired matches are dropped
    /// too but counted as expirations. An empty pattern matches every key.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        let mut expired = 0;

        self.entries.retain(|key, entry| {
            if !key.contains(pattern) {
                return true;
            }
            if entry.is_expired(now) {
                expired += 1;
            } else {
                removed += 1;
            }
            false
        });

        Counters::bump(&self.counters.invalidated, removed);
        Counters::bump(&self.counters.expired_removed, expired);
        if removed > 0 {
            debug!(pattern, removed, "invalidated cache entries");
        }
        removed
    }

    /// Like [`invalidate`](Self::invalidate), but refuses an empty pattern.
    pub fn try_invalidate(&self, pattern: &str) -> Result<usize> {
        if pattern.is_empty() {
            return Err(TollgateError::EmptyInvalidationPattern);
        }
        Ok(self.invalidate(pattern))
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes all expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired = self.expired_keys(now);
        self.remove_expired(&expired, now)
    }

    /// Collects keys that are expired at `now`, holding one shard lock at a time.
    pub(crate) fn expired_keys(&self, now: Instant) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Removes the given keys if they are still expired at `now`.
    pub(crate) fn remove_expired(&self, keys: &[String], now: Instant) -> usize {
        let removed = keys
            .iter()
            .filter(|key| self.entries.remove_if(*key, |_, e| e.is_expired(now)).is_some())
            .count();
        Counters::bump(&self.counters.expired_removed, removed);
        removed
    }

    /// Returns the number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            entries: self.entries.len(),
            capacity: self.config.max_entries,
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            stores: load(&self.counters.stores),
            rejected_stores: load(&self.counters.rejected_stores),
            expired_removed: load(&self.counters.expired_removed),
            invalidated: load(&self.counters.invalidated),
        }
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> CacheInvalidator for ResponseCache<V> {
    fn try_invalidate(&self, pattern: &str) -> Result<usize> {
        ResponseCache::try_invalidate(self, pattern)
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Stored entries, including expired ones awaiting reclamation
    pub entries: usize,
    /// Configured entry bound
    pub capacity: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing live
    pub misses: u64,
    /// Successful stores
    pub stores: u64,
    /// Stores refused (capacity or invalid TTL)
    pub rejected_stores: u64,
    /// Entries reclaimed after expiry
    pub expired_removed: u64,
    /// Live entries removed by pattern invalidation
    pub invalidated: u64,
}
