//! # Tollgate Core
//!
//! Core types, errors, and key derivation for the Tollgate request-serving layer.
//!
//! This crate provides the building blocks shared by the cache, the limiter, and
//! the HTTP integration:
//!
//! - **Types**: tiers, tier budgets, principals, client identifiers, admission decisions
//! - **Keys**: the single place where cache keys, limiter keys, and invalidation
//!   patterns are derived
//! - **Errors**: one error hierarchy with classifiers for the degrade policies
//! - **Constants**: default budgets, TTLs, and sweep periods
//! - **Traits**: the invalidation seam used by write-path glue
//!
//! ## Example
//!
//! ```rust
//! use tollgate_core::{keys, Principal};
//!
//! let key = keys::cache_key(&Principal::Anonymous, "/api/v1/resources/42", None);
//! assert_eq!(key, "anonymous|/api/v1/resources/42|");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{Result, TollgateError};
pub use traits::*;
pub use types::*;
