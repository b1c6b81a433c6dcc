//! Admission decisions.

use std::time::Duration;

/// Budget snapshot returned with an admitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
    /// Tier budget per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

/// Outcome of an admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allowed(Quota),
    /// The request must be rejected; the client may retry after the delay.
    Rejected {
        /// Time until the client's window resets
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns true if the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    /// Returns the retry delay of a rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allowed(_) => None,
            Decision::Rejected { retry_after } => Some(*retry_after),
        }
    }
}
