//! Default budgets and timings for Tollgate.
//!
//! The tier budgets are the externally observed contract: clients and operators
//! rely on these exact numbers, so changing one is a behavior change.

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Default time-to-live for a cached response, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default period of the background reclamation sweep, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default upper bound on live cache entries.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default upper bound on a response body the pipeline will buffer for caching.
pub const DEFAULT_MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Number of expired keys the sweeper removes before yielding to other tasks.
pub const SWEEP_BATCH_SIZE: usize = 256;

/// Key component used when no principal was resolved.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

// ═══════════════════════════════════════════════════════════════════════════════
// ADMISSION TIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// General API tier: 100 requests per 15 minutes.
pub const GENERAL_MAX_REQUESTS: u32 = 100;
/// General API tier window, in seconds.
pub const GENERAL_WINDOW_SECS: u64 = 15 * 60;

/// Authentication tier (login, register): 10 requests per hour.
pub const AUTH_MAX_REQUESTS: u32 = 10;
/// Authentication tier window, in seconds.
pub const AUTH_WINDOW_SECS: u64 = 60 * 60;

/// Password-reset tier: 3 requests per hour.
pub const PASSWORD_RESET_MAX_REQUESTS: u32 = 3;
/// Password-reset tier window, in seconds.
pub const PASSWORD_RESET_WINDOW_SECS: u64 = 60 * 60;

/// Store/commerce tier: 50 requests per 15 minutes.
pub const STORE_MAX_REQUESTS: u32 = 50;
/// Store tier window, in seconds.
pub const STORE_WINDOW_SECS: u64 = 15 * 60;

/// Administrative tier: 60 requests per 15 minutes.
pub const ADMIN_MAX_REQUESTS: u32 = 60;
/// Administrative tier window, in seconds.
pub const ADMIN_WINDOW_SECS: u64 = 15 * 60;

/// Default bound on distinct clients tracked per tier.
pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 100_000;

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP HEADERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Header set by the upstream identity resolver with the verified principal id.
pub const PRINCIPAL_HEADER: &str = "x-authenticated-principal";

/// Response header reporting whether the body came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Response header with the tier budget.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";

/// Response header with the requests left in the current window.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Response header with the seconds until the current window resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
