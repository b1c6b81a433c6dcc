//! Domain types for Tollgate.
//!
//! - [`Tier`]: endpoint sensitivity class with its own admission budget
//! - [`TierConfig`]: budget, window, keying, and failure policy for one tier
//! - [`Principal`]: resolved identity of the caller, or anonymous
//! - [`ClientId`]: network origin used for admission
//! - [`Decision`]: outcome of an admission check

mod decision;
mod identity;
mod tier;

pub use decision::*;
pub use identity::*;
pub use tier::*;
