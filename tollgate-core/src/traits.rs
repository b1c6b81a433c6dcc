//! Common traits for Tollgate.
//!
//! These traits define the seams between the cache and the code that mutates
//! the resources it mirrors, so write paths can be tested against failing
//! implementations.

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// INVALIDATION TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for removing cached entries after a mutation.
///
/// Callers treat failures as best-effort: the write has already succeeded and
/// stale entries still expire through their TTL.
pub trait CacheInvalidator: Send + Sync {
    /// Removes every entry whose key contains `pattern`.
    ///
    /// Returns the number of entries removed.
    fn try_invalidate(&self, pattern: &str) -> Result<usize>;

    /// Removes entries for every pattern, stopping at the first failure.
    ///
    /// Returns the total number of entries removed.
    fn try_invalidate_all(&self, patterns: &[String]) -> Result<usize> {
        patterns
            .iter()
            .try_fold(0, |total, pattern| Ok(total + self.try_invalidate(pattern)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TollgateError;

    struct Counting;

    impl CacheInvalidator for Counting {
        fn try_invalidate(&self, pattern: &str) -> Result<usize> {
            if pattern.is_empty() {
                Err(TollgateError::EmptyInvalidationPattern)
            } else {
                Ok(pattern.len())
            }
        }
    }

    #[test]
    fn test_invalidate_all_sums_counts() {
        let patterns = vec!["ab".to_string(), "cde".to_string()];
        assert_eq!(Counting.try_invalidate_all(&patterns).unwrap(), 5);
    }

    #[test]
    fn test_invalidate_all_stops_on_error() {
        let patterns = vec!["ab".to_string(), String::new()];
        assert!(Counting.try_invalidate_all(&patterns).is_err());
    }
}
