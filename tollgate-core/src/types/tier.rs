//! Admission tiers and their budgets.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Result, TollgateError};

/// Endpoint class with an independently configured admission budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// General API traffic.
    #[default]
    General,
    /// Login and registration.
    Auth,
    /// Password reset requests.
    PasswordReset,
    /// Store/commerce endpoints.
    Store,
    /// Administrative endpoints.
    Admin,
}

impl Tier {
    /// All tiers, in a stable order.
    pub const ALL: [Tier; 5] = [
        Tier::General,
        Tier::Auth,
        Tier::PasswordReset,
        Tier::Store,
        Tier::Admin,
    ];

    /// Returns the tier's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::General => "general",
            Tier::Auth => "auth",
            Tier::PasswordReset => "password-reset",
            Tier::Store => "store",
            Tier::Admin => "admin",
        }
    }

    /// Returns the suffix used for this tier's environment variables.
    pub fn env_suffix(&self) -> &'static str {
        match self {
            Tier::General => "GENERAL",
            Tier::Auth => "AUTH",
            Tier::PasswordReset => "PASSWORD_RESET",
            Tier::Store => "STORE",
            Tier::Admin => "ADMIN",
        }
    }

    /// Failure policy applied when this tier's limiter cannot decide.
    ///
    /// Availability wins for general and store traffic; abuse resistance wins
    /// for credential and administrative endpoints.
    pub fn default_failure_policy(&self) -> FailurePolicy {
        match self {
            Tier::General | Tier::Store => FailurePolicy::Open,
            Tier::Auth | Tier::PasswordReset | Tier::Admin => FailurePolicy::Closed,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| TollgateError::UnknownTier(s.to_string()))
    }
}

/// What a limiter does when it cannot reach a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Admit the request.
    Open,
    /// Reject the request.
    Closed,
}

/// How a tier identifies a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKeying {
    /// Network address only.
    #[default]
    Address,
    /// Network address plus request path, so each endpoint has its own budget.
    AddressAndPath,
}

/// Budget and behavior of a single admission tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Tier this configuration applies to
    pub tier: Tier,
    /// Maximum admitted requests per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_seconds: u64,
    /// How clients are keyed
    #[serde(default)]
    pub keying: ClientKeying,
    /// Behavior on internal limiter failure
    pub failure_policy: FailurePolicy,
    /// Bound on distinct clients tracked at once; concurrent first requests
    /// from new clients can overshoot it by at most one per thread
    pub max_clients: usize,
}

impl TierConfig {
    /// Returns the required default budget for `tier`.
    pub fn default_for(tier: Tier) -> Self {
        let (max_requests, window_seconds) = match tier {
            Tier::General => (GENERAL_MAX_REQUESTS, GENERAL_WINDOW_SECS),
            Tier::Auth => (AUTH_MAX_REQUESTS, AUTH_WINDOW_SECS),
            Tier::PasswordReset => (PASSWORD_RESET_MAX_REQUESTS, PASSWORD_RESET_WINDOW_SECS),
            Tier::Store => (STORE_MAX_REQUESTS, STORE_WINDOW_SECS),
            Tier::Admin => (ADMIN_MAX_REQUESTS, ADMIN_WINDOW_SECS),
        };

        Self {
            tier,
            max_requests,
            window_seconds,
            keying: ClientKeying::Address,
            failure_policy: tier.default_failure_policy(),
            max_clients: DEFAULT_MAX_TRACKED_CLIENTS,
        }
    }

    /// Sets the budget.
    #[must_use]
    pub fn with_budget(mut self, max_requests: u32, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.window_seconds = window.as_secs();
        self
    }

    /// Sets the client keying.
    #[must_use]
    pub fn with_keying(mut self, keying: ClientKeying) -> Self {
        self.keying = keying;
        self
    }

    /// Sets the client tracker bound.
    #[must_use]
    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Returns the window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Checks that the budget can admit at least one request.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(TollgateError::ConfigError(format!(
                "tier '{}' must allow at least one request per window",
                self.tier
            )));
        }
        if self.window_seconds == 0 {
            return Err(TollgateError::ConfigError(format!(
                "tier '{}' window must be at least one second",
                self.tier
            )));
        }
        if self.max_clients == 0 {
            return Err(TollgateError::ConfigError(format!(
                "tier '{}' must track at least one client",
                self.tier
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Tier::General, 100, 900 ; "general")]
    #[test_case(Tier::Auth, 10, 3600 ; "auth")]
    #[test_case(Tier::PasswordReset, 3, 3600 ; "password reset")]
    #[test_case(Tier::Store, 50, 900 ; "store")]
    #[test_case(Tier::Admin, 60, 900 ; "admin")]
    fn test_default_budgets(tier: Tier, max: u32, window: u64) {
        let config = TierConfig::default_for(tier);
        assert_eq!(config.max_requests, max);
        assert_eq!(config.window_seconds, window);
        assert!(config.validate().is_ok());
    }

    #[test_case("general", Tier::General ; "lowercase")]
    #[test_case("AUTH", Tier::Auth ; "uppercase")]
    #[test_case("password_reset", Tier::PasswordReset ; "underscored")]
    #[test_case(" password-reset ", Tier::PasswordReset ; "padded")]
    #[test_case("admin", Tier::Admin ; "admin")]
    fn test_parse_tier(input: &str, expected: Tier) {
        assert_eq!(input.parse::<Tier>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_tier() {
        assert!(matches!(
            "vip".parse::<Tier>(),
            Err(TollgateError::UnknownTier(_))
        ));
    }

    #[test]
    fn test_failure_policies() {
        assert_eq!(Tier::General.default_failure_policy(), FailurePolicy::Open);
        assert_eq!(Tier::Auth.default_failure_policy(), FailurePolicy::Closed);
        assert_eq!(
            Tier::PasswordReset.default_failure_policy(),
            FailurePolicy::Closed
        );
    }

    #[test]
    fn test_validate_rejects_empty_budget() {
        let config = TierConfig::default_for(Tier::Store).with_budget(0, Duration::from_secs(60));
        assert!(config.validate().unwrap_err().is_config_error());

        let config = TierConfig::default_for(Tier::Store).with_budget(5, Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tier_serde_names() {
        let json = serde_json::to_string(&Tier::PasswordReset).unwrap();
        assert_eq!(json, "\"password-reset\"");
    }
}
