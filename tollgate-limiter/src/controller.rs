//! Routing requests to per-tier limiters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use tollgate_core::error::{Result, TollgateError};
use tollgate_core::types::{ClientId, Decision, FailurePolicy, Quota, Tier, TierConfig};

use crate::window::FixedWindowLimiter;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Budgets for every tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// One entry per configured tier. Tiers left out use their defaults.
    pub tiers: Vec<TierConfig>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            tiers: Tier::ALL.iter().copied().map(TierConfig::default_for).collect(),
        }
    }
}

impl AdmissionConfig {
    /// Sets the configuration for one tier, replacing any existing entry.
    pub fn with_tier(mut self, config: TierConfig) -> Self {
        match self.tiers.iter_mut().find(|t| t.tier == config.tier) {
            Some(existing) => *existing = config,
            None => self.tiers.push(config),
        }
        self
    }

    /// Returns the configuration for `tier`, if present.
    pub fn tier(&self, tier: Tier) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Validates every tier and rejects duplicates.
    pub fn validate(&self) -> Result<()> {
        for (idx, config) in self.tiers.iter().enumerate() {
            config.validate()?;
            if self.tiers[..idx].iter().any(|t| t.tier == config.tier) {
                return Err(TollgateError::ConfigError(format!(
                    "tier '{}' configured more than once",
                    config.tier
                )));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Admission controller holding one limiter per tier.
///
/// A request is counted against exactly one tier. Tiers never share counters,
/// so exhausting the password-reset budget leaves the general budget intact.
#[derive(Debug)]
pub struct AdmissionController {
    limiters: HashMap<Tier, FixedWindowLimiter>,
}

impl AdmissionController {
    /// Builds a controller, filling in defaults for unconfigured tiers.
    pub fn new(config: AdmissionConfig) -> Result<Self> {
        config.validate()?;

        let mut limiters: HashMap<Tier, FixedWindowLimiter> = config
            .tiers
            .into_iter()
            .map(|t| (t.tier, FixedWindowLimiter::new(t)))
            .collect();

        for tier in Tier::ALL {
            limiters
                .entry(tier)
                .or_insert_with(|| FixedWindowLimiter::new(TierConfig::default_for(tier)));
        }

        Ok(Self { limiters })
    }

    /// Decides whether `client` may proceed under `tier`.
    ///
    /// Never fails: when the count cannot be taken, the tier's failure policy
    /// decides. Open tiers admit, closed tiers reject for one full window.
    #[instrument(level = "debug", skip(self, client), fields(client = %client))]
    pub fn admit(&self, tier: Tier, client: &ClientId) -> Decision {
        let Some(limiter) = self.limiters.get(&tier) else {
            return resolve_failure(
                &TierConfig::default_for(tier),
                TollgateError::InternalError(format!("no limiter for tier '{tier}'")),
            );
        };

        match limiter.check(client) {
            Ok(decision) => {
                if let Decision::Rejected { retry_after } = decision {
                    debug!(
                        tier = %tier,
                        retry_after_secs = retry_after.as_secs(),
                        "request rejected"
                    );
                }
                decision
            }
            Err(err) => resolve_failure(limiter.config(), err),
        }
    }

    /// Returns the limiter for `tier`.
    pub fn limiter(&self, tier: Tier) -> Option<&FixedWindowLimiter> {
        self.limiters.get(&tier)
    }

    /// Returns the active configuration for `tier`.
    pub fn tier_config(&self, tier: Tier) -> Option<&TierConfig> {
        self.limiter(tier).map(FixedWindowLimiter::config)
    }

    /// Returns every tier's configuration in declaration order.
    pub fn tiers(&self) -> Vec<&TierConfig> {
        Tier::ALL
            .iter()
            .filter_map(|tier| self.tier_config(*tier))
            .collect()
    }
}

fn resolve_failure(config: &TierConfig, err: TollgateError) -> Decision {
    match config.failure_policy {
        FailurePolicy::Open => {
            warn!(tier = %config.tier, error = %err, "admission indeterminate, failing open");
            Decision::Allowed(Quota {
                limit: config.max_requests,
                remaining: 0,
                reset_after: config.window(),
            })
        }
        FailurePolicy::Closed => {
            warn!(tier = %config.tier, error = %err, "admission indeterminate, failing closed");
            Decision::Rejected {
                retry_after: config.window(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use test_case::test_case;

    fn controller() -> AdmissionController {
        AdmissionController::new(AdmissionConfig::default()).unwrap()
    }

    #[test_case(Tier::General ; "general")]
    #[test_case(Tier::Auth ; "auth")]
    #[test_case(Tier::PasswordReset ; "password reset")]
    #[test_case(Tier::Store ; "store")]
    #[test_case(Tier::Admin ; "admin")]
    #[tokio::test(start_paused = true)]
    async fn test_budget_then_rejection_then_reset(tier: Tier) {
        let controller = controller();
        let config = controller.tier_config(tier).unwrap().clone();
        let client = ClientId::new("198.51.100.4");

        for _ in 0..config.max_requests {
            assert!(controller.admit(tier, &client).is_allowed());
        }
        let rejected = controller.admit(tier, &client);
        let retry_after = rejected.retry_after().unwrap();
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= config.window());

        tokio::time::advance(config.window()).await;
        assert!(controller.admit(tier, &client).is_allowed());
        assert_eq!(
            controller.limiter(tier).unwrap().current_count(&client),
            Some(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiers_do_not_share_counters() {
        let controller = controller();
        let client = ClientId::new("198.51.100.4");

        for _ in 0..3 {
            controller.admit(Tier::PasswordReset, &client);
        }
        assert!(!controller.admit(Tier::PasswordReset, &client).is_allowed());
        assert!(controller.admit(Tier::General, &client).is_allowed());
        assert!(controller.admit(Tier::Auth, &client).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_attempts_over_an_hour() {
        let controller = controller();
        let client = ClientId::new("203.0.113.9");

        for attempt in 0..10 {
            if attempt > 0 {
                tokio::time::advance(Duration::from_secs(60)).await;
            }
            assert!(controller.admit(Tier::Auth, &client).is_allowed());
        }

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!controller.admit(Tier::Auth, &client).is_allowed());

        // 61 minutes after the first attempt.
        tokio::time::advance(Duration::from_secs(51 * 60)).await;
        assert!(controller.admit(Tier::Auth, &client).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_policy_per_tier() {
        let config = AdmissionConfig::default()
            .with_tier(TierConfig::default_for(Tier::General).with_max_clients(1))
            .with_tier(TierConfig::default_for(Tier::Auth).with_max_clients(1));
        let controller = AdmissionController::new(config).unwrap();
        let first = ClientId::new("10.0.0.1");
        let second = ClientId::new("10.0.0.2");

        controller.admit(Tier::General, &first);
        controller.admit(Tier::Auth, &first);

        assert!(controller.admit(Tier::General, &second).is_allowed());

        let decision = controller.admit(Tier::Auth, &second);
        assert_eq!(decision.retry_after(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_missing_tiers_use_defaults() {
        let controller = AdmissionController::new(AdmissionConfig { tiers: vec![] }).unwrap();
        assert_eq!(controller.tiers().len(), Tier::ALL.len());
        assert_eq!(
            controller.tier_config(Tier::Store).unwrap().max_requests,
            TierConfig::default_for(Tier::Store).max_requests
        );
    }

    #[test]
    fn test_with_tier_replaces_existing() {
        let config = AdmissionConfig::default()
            .with_tier(TierConfig::default_for(Tier::Auth).with_budget(5, Duration::from_secs(60)));
        assert_eq!(config.tiers.len(), Tier::ALL.len());
        assert_eq!(config.tier(Tier::Auth).unwrap().max_requests, 5);
    }

    #[test]
    fn test_duplicate_tier_rejected() {
        let mut config = AdmissionConfig::default();
        config.tiers.push(TierConfig::default_for(Tier::Admin));
        assert!(AdmissionController::new(config).unwrap_err().is_config_error());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = AdmissionConfig::default()
            .with_tier(TierConfig::default_for(Tier::Store).with_budget(0, Duration::from_secs(60)));
        assert!(config.validate().is_err());
    }
}
