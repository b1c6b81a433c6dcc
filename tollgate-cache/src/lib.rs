//! TTL response cache for Tollgate.
//!
//! Generic in-memory cache with lazy per-key expiry, a bounded entry count,
//! substring invalidation, and a background sweep task that reclaims entries
//! nobody reads again.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod sweeper;

pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use sweeper::{spawn_sweeper, SweeperHandle};
