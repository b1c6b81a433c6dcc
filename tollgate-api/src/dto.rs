//! DTOs for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_core::types::{ClientKeying, FailurePolicy, Tier, TierConfig};

/// A catalog resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource ID
    pub id: u64,
    /// Display name
    pub name: String,
    /// Optional free-form description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

/// Request to create or replace a resource.
#[derive(Debug, Deserialize)]
pub struct ResourceRequest {
    /// Display name (required, non-blank)
    pub name: String,
    /// Optional description
    pub description: Option<String>,
}

/// Caller identity.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// Authenticated principal ID
    pub principal: String,
}

/// Acknowledgement for the auth flows.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    /// Always "accepted"
    pub status: String,
    /// Which flow accepted the request
    pub flow: String,
}

/// A store product.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    /// SKU
    pub sku: String,
    /// Display name
    pub name: String,
    /// Price in cents
    pub price_cents: u64,
}

/// Request to invalidate cached entries.
#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    /// Substring matched against cache keys
    pub pattern: String,
}

/// Response for cache invalidation.
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    /// Pattern that was applied
    pub pattern: String,
    /// Live entries removed
    pub removed: usize,
}

/// Response for clearing the cache.
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    /// Entries dropped
    pub removed: usize,
}

/// Configured budget of one tier.
#[derive(Debug, Serialize)]
pub struct TierLimitDto {
    /// Tier name
    pub tier: Tier,
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_seconds: u64,
    /// How clients are keyed
    pub keying: ClientKeying,
    /// Behavior when the limiter cannot decide
    pub failure_policy: FailurePolicy,
    /// Clients currently tracked
    pub tracked_clients: usize,
}

impl TierLimitDto {
    /// Builds the DTO from a tier configuration and its live client count.
    pub fn new(config: &TierConfig, tracked_clients: usize) -> Self {
        Self {
            tier: config.tier,
            max_requests: config.max_requests,
            window_seconds: config.window_seconds,
            keying: config.keying,
            failure_policy: config.failure_policy,
            tracked_clients,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Live cache entries
    pub cache_entries: usize,
    /// Whether response caching is on
    pub cache_enabled: bool,
}
