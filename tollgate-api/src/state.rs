//! App state: cache, admission controller, route policy, config.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use tollgate_cache::{CacheConfig, ResponseCache};
use tollgate_core::constants::DEFAULT_MAX_CACHED_BODY_BYTES;
use tollgate_core::error::{Result, TollgateError};
use tollgate_core::keys::invalidation_patterns;
use tollgate_core::traits::CacheInvalidator;
use tollgate_core::types::{Tier, TierConfig};
use tollgate_limiter::{AdmissionConfig, AdmissionController};

use crate::catalog::Catalog;
use crate::middleware::CachedResponse;
use crate::policy::RoutePolicy;

/// Server configuration, fixed at startup.
#[derive(Clone, Debug, Serialize)]
pub struct ApiConfig {
    /// Response caching on or off
    pub enable_cache: bool,
    /// Cache TTL, capacity and sweep period
    pub cache: CacheConfig,
    /// Largest response body the cache will buffer
    pub max_cached_body_bytes: usize,
    /// Per-tier budgets
    pub admission: AdmissionConfig,
    /// Take the client address from `x-real-ip` / `x-forwarded-for`
    pub trust_proxy_headers: bool,
    /// Take the caller identity from `x-authenticated-principal`
    pub trust_principal_header: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache: CacheConfig::default(),
            max_cached_body_bytes: DEFAULT_MAX_CACHED_BODY_BYTES,
            admission: AdmissionConfig::default(),
            trust_proxy_headers: false,
            trust_principal_header: false,
        }
    }
}

impl ApiConfig {
    /// Loads `.env` if present, then reads `TOLLGATE_*` variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = parse_bool(&lookup, "TOLLGATE_ENABLE_CACHE")? {
            config.enable_cache = v;
        }
        if let Some(v) = parse(&lookup, "TOLLGATE_CACHE_TTL_SECS")? {
            config.cache.default_ttl_seconds = v;
        }
        if let Some(v) = parse(&lookup, "TOLLGATE_CACHE_MAX_ENTRIES")? {
            config.cache.max_entries = v;
        }
        if let Some(v) = parse(&lookup, "TOLLGATE_CACHE_SWEEP_SECS")? {
            config.cache.sweep_interval_seconds = v;
        }
        if let Some(v) = parse(&lookup, "TOLLGATE_CACHE_MAX_BODY_BYTES")? {
            config.max_cached_body_bytes = v;
        }
        if let Some(v) = parse_bool(&lookup, "TOLLGATE_TRUST_PROXY_HEADERS")? {
            config.trust_proxy_headers = v;
        }
        if let Some(v) = parse_bool(&lookup, "TOLLGATE_TRUST_PRINCIPAL_HEADER")? {
            config.trust_principal_header = v;
        }

        for tier in Tier::ALL {
            let max = parse::<u32>(&lookup, &format!("TOLLGATE_LIMIT_{}_MAX", tier.env_suffix()))?;
            let window = parse::<u64>(
                &lookup,
                &format!("TOLLGATE_LIMIT_{}_WINDOW_SECS", tier.env_suffix()),
            )?;
            if max.is_none() && window.is_none() {
                continue;
            }

            let current = config
                .admission
                .tier(tier)
                .cloned()
                .unwrap_or_else(|| TierConfig::default_for(tier));
            let updated = current.clone().with_budget(
                max.unwrap_or(current.max_requests),
                Duration::from_secs(window.unwrap_or(current.window_seconds)),
            );
            config.admission = config.admission.with_tier(updated);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.admission.validate()?;
        if self.max_cached_body_bytes == 0 {
            return Err(TollgateError::ConfigError(
                "max_cached_body_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            TollgateError::ConfigError(format!("{name}: invalid value '{raw}'"))
        }),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<bool>> {
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(None),
        Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some("0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(raw) => Err(TollgateError::ConfigError(format!(
            "{name}: expected a boolean, got '{raw}'"
        ))),
    }
}

/// Shared state for the middleware stack and handlers.
pub struct AppState {
    /// Startup configuration
    pub config: ApiConfig,
    /// Route to tier, cache rule and family mapping
    pub policy: RoutePolicy,
    /// Captured responses
    pub cache: Arc<ResponseCache<CachedResponse>>,
    /// Per-tier limiters
    pub admission: AdmissionController,
    /// Backing store for the resource routes
    pub catalog: Catalog,
}

impl AppState {
    /// Builds state with the bundled route policy.
    pub fn new(config: ApiConfig) -> Result<Self> {
        Self::with_policy(config, RoutePolicy::standard())
    }

    /// Builds state with a custom route policy.
    pub fn with_policy(config: ApiConfig, policy: RoutePolicy) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            cache: Arc::new(ResponseCache::with_config(config.cache.clone())),
            admission: AdmissionController::new(config.admission.clone())?,
            catalog: Catalog::new(),
            policy,
            config,
        })
    }

    /// Drops cached reads affected by a successful write to `path`.
    ///
    /// Best-effort: failures are logged and leave stale entries to their TTL.
    pub fn invalidate_family(&self, path: &str, family_root: &str) -> usize {
        invalidate_family_with(self.cache.as_ref(), path, family_root)
    }
}

fn invalidate_family_with(invalidator: &dyn CacheInvalidator, path: &str, family_root: &str) -> usize {
    let patterns = invalidation_patterns(path, family_root);
    match invalidator.try_invalidate_all(&patterns) {
        Ok(removed) => {
            info!(path, family = family_root, removed, "invalidated cached reads");
            removed
        }
        Err(err) => {
            warn!(path, family = family_root, error = %err, "cache invalidation failed");
            0
        }
    }
}
