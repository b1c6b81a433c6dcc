//! Error types for Tollgate.
//!
//! Every failure this layer can produce maps onto one of four outcomes: a
//! degraded cache (recovered as a miss or no-op), an indeterminate admission
//! (resolved by the tier's failure policy), a configuration problem (fatal at
//! startup), or an internal invariant violation. The classifiers below let
//! callers pick the right recovery without matching every variant.

use thiserror::Error;

use crate::types::Tier;

/// Result type alias using `TollgateError`.
pub type Result<T> = std::result::Result<T, TollgateError>;

/// Main error type for all Tollgate operations.
#[derive(Debug, Error)]
pub enum TollgateError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CACHE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The cache is full and the key is not already present.
    #[error("Cache at capacity ({capacity} entries)")]
    CacheCapacityExceeded {
        /// Configured entry bound
        capacity: usize,
    },

    /// A store was attempted with a zero time-to-live.
    #[error("Cache TTL must be greater than zero")]
    InvalidTtl,

    /// An invalidation pattern was empty and would match every key.
    #[error("Invalidation pattern must not be empty")]
    EmptyInvalidationPattern,

    /// A response body could not be buffered for caching.
    #[error("Response body exceeds the cacheable limit of {limit} bytes")]
    BodyTooLarge {
        /// Configured body limit in bytes
        limit: usize,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMISSION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// A tier's client tracker is full even after pruning stale windows.
    #[error("Client tracker for tier '{tier}' is full ({capacity} clients)")]
    TrackerFull {
        /// Tier whose tracker overflowed
        tier: Tier,
        /// Configured client bound
        capacity: usize,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Configuration value missing, malformed, or out of range.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Tier name that does not correspond to any known tier.
    #[error("Unknown admission tier: {0}")]
    UnknownTier(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TollgateError {
    /// Returns true if this error should degrade the cache to a miss or no-op.
    pub fn is_cache_degraded(&self) -> bool {
        matches!(
            self,
            TollgateError::CacheCapacityExceeded { .. }
                | TollgateError::InvalidTtl
                | TollgateError::EmptyInvalidationPattern
                | TollgateError::BodyTooLarge { .. }
        )
    }

    /// Returns true if this error leaves an admission decision undetermined.
    pub fn is_admission_indeterminate(&self) -> bool {
        matches!(
            self,
            TollgateError::TrackerFull { .. } | TollgateError::InternalError(_)
        )
    }

    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TollgateError::ConfigError(_) | TollgateError::UnknownTier(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TollgateError::TrackerFull {
            tier: Tier::PasswordReset,
            capacity: 512,
        };
        assert!(err.to_string().contains("password-reset"));
        assert!(err.to_string().contains("512"));
    }

    #[test]
    fn test_error_classification() {
        assert!(TollgateError::InvalidTtl.is_cache_degraded());
        assert!(TollgateError::CacheCapacityExceeded { capacity: 1 }.is_cache_degraded());
        assert!(!TollgateError::ConfigError("x".into()).is_cache_degraded());

        assert!(TollgateError::TrackerFull {
            tier: Tier::General,
            capacity: 1
        }
        .is_admission_indeterminate());
        assert!(!TollgateError::InvalidTtl.is_admission_indeterminate());

        assert!(TollgateError::UnknownTier("vip".into()).is_config_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let result: Result<serde_json::Value> = json_result.map_err(TollgateError::from);
        assert!(matches!(result, Err(TollgateError::JsonError(_))));
    }
}
