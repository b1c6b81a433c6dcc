//! Route policy: which tier, cache rule and resource family a path maps to.
//!
//! Every lookup picks the longest registered prefix that the path lies under
//! on a segment boundary, so `/api/v1/store` covers `/api/v1/store/products`
//! but not `/api/v1/storefront`.

use std::time::Duration;

use serde::Serialize;

use tollgate_core::keys::{is_within, normalize_path};
use tollgate_core::types::Tier;

/// Who a cached read is shared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheScope {
    /// Same response for every caller of the same path and query.
    Shared,
    /// Response depends on the caller; never cached for anonymous callers.
    PerPrincipal,
}

/// Caching rule for a route prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheRule {
    /// Sharing scope
    pub scope: CacheScope,
    /// TTL override; the cache default applies when unset
    pub ttl: Option<Duration>,
}

/// Prefix-based routing of requests to tiers, cache rules and families.
#[derive(Clone, Debug, Default)]
pub struct RoutePolicy {
    tiers: Vec<(String, Tier)>,
    cache: Vec<(String, CacheRule)>,
    families: Vec<(String, ())>,
    exempt: Vec<(String, ())>,
}

impl RoutePolicy {
    /// Policy for the bundled routes.
    pub fn standard() -> Self {
        Self::default()
            .exempt("/health")
            .tier("/api/v1/auth/login", Tier::Auth)
            .tier("/api/v1/auth/register", Tier::Auth)
            .tier("/api/v1/auth/password-reset", Tier::PasswordReset)
            .tier("/api/v1/store", Tier::Store)
            .tier("/api/v1/admin", Tier::Admin)
            .cache("/api/v1/resources", CacheScope::Shared)
            .family("/api/v1/resources")
            .cache("/api/v1/me", CacheScope::PerPrincipal)
            .cache_with_ttl(
                "/api/v1/store/products",
                CacheScope::Shared,
                Duration::from_secs(60),
            )
    }

    /// Routes `prefix` to `tier`. Unrouted paths fall to [`Tier::General`].
    pub fn tier(mut self, prefix: &str, tier: Tier) -> Self {
        upsert(&mut self.tiers, prefix, tier);
        self
    }

    /// Caches GET responses under `prefix` with the default TTL.
    pub fn cache(mut self, prefix: &str, scope: CacheScope) -> Self {
        upsert(&mut self.cache, prefix, CacheRule { scope, ttl: None });
        self
    }

    /// Caches GET responses under `prefix` with a TTL override.
    pub fn cache_with_ttl(mut self, prefix: &str, scope: CacheScope, ttl: Duration) -> Self {
        upsert(
            &mut self.cache,
            prefix,
            CacheRule {
                scope,
                ttl: Some(ttl),
            },
        );
        self
    }

    /// Declares `prefix` as a resource family. Successful writes anywhere
    /// beneath it invalidate the affected cached reads.
    pub fn family(mut self, prefix: &str) -> Self {
        upsert(&mut self.families, prefix, ());
        self
    }

    /// Exempts `prefix` from admission control.
    pub fn exempt(mut self, prefix: &str) -> Self {
        upsert(&mut self.exempt, prefix, ());
        self
    }

    /// Tier for `path`.
    pub fn tier_for(&self, path: &str) -> Tier {
        longest_match(&self.tiers, path)
            .map(|(_, tier)| *tier)
            .unwrap_or_default()
    }

    /// Cache rule for `path`, if the route is cacheable.
    pub fn cache_rule_for(&self, path: &str) -> Option<CacheRule> {
        longest_match(&self.cache, path).map(|(_, rule)| *rule)
    }

    /// Root of the family `path` belongs to.
    pub fn family_for(&self, path: &str) -> Option<&str> {
        longest_match(&self.families, path).map(|(root, _)| root.as_str())
    }

    /// Returns true if `path` bypasses admission.
    pub fn is_exempt(&self, path: &str) -> bool {
        longest_match(&self.exempt, path).is_some()
    }
}

fn upsert<T>(entries: &mut Vec<(String, T)>, prefix: &str, value: T) {
    let prefix = normalize_path(prefix);
    match entries.iter_mut().find(|(existing, _)| *existing == prefix) {
        Some(entry) => entry.1 = value,
        None => entries.push((prefix, value)),
    }
}

fn longest_match<'a, T>(entries: &'a [(String, T)], path: &str) -> Option<&'a (String, T)> {
    entries
        .iter()
        .filter(|(prefix, _)| is_within(path, prefix))
        .max_by_key(|(prefix, _)| prefix.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrouted_paths_are_general() {
        let policy = RoutePolicy::standard();
        assert_eq!(policy.tier_for("/api/v1/resources/9"), Tier::General);
        assert_eq!(policy.tier_for("/"), Tier::General);
    }

    #[test]
    fn test_tier_prefixes() {
        let policy = RoutePolicy::standard();
        assert_eq!(policy.tier_for("/api/v1/auth/login"), Tier::Auth);
        assert_eq!(policy.tier_for("/api/v1/auth/password-reset"), Tier::PasswordReset);
        assert_eq!(policy.tier_for("/api/v1/store/products"), Tier::Store);
        assert_eq!(policy.tier_for("/api/v1/storefront"), Tier::General);
        assert_eq!(policy.tier_for("/api/v1/admin/cache/"), Tier::Admin);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let policy = RoutePolicy::default()
            .tier("/api", Tier::Store)
            .tier("/api/v1/auth", Tier::Auth);
        assert_eq!(policy.tier_for("/api/v1/auth/login"), Tier::Auth);
        assert_eq!(policy.tier_for("/api/v1/other"), Tier::Store);
    }

    #[test]
    fn test_cache_rules() {
        let policy = RoutePolicy::standard();

        let products = policy.cache_rule_for("/api/v1/store/products").unwrap();
        assert_eq!(products.ttl, Some(Duration::from_secs(60)));

        let me = policy.cache_rule_for("/api/v1/me").unwrap();
        assert_eq!(me.scope, CacheScope::PerPrincipal);

        assert!(policy.cache_rule_for("/api/v1/admin/cache").is_none());
    }

    #[test]
    fn test_families_and_exemptions() {
        let policy = RoutePolicy::standard();
        assert_eq!(
            policy.family_for("/api/v1/resources/42"),
            Some("/api/v1/resources")
        );
        assert_eq!(policy.family_for("/api/v1/me"), None);
        assert!(policy.is_exempt("/health"));
        assert!(!policy.is_exempt("/healthz"));
    }

    #[test]
    fn test_reregistering_replaces() {
        let policy = RoutePolicy::default()
            .tier("/x/", Tier::Auth)
            .tier("/x", Tier::Admin);
        assert_eq!(policy.tier_for("/x/y"), Tier::Admin);
    }
}
