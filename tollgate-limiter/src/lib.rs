//! Tiered admission control for Tollgate.
//!
//! Each [`Tier`](tollgate_core::Tier) gets its own [`FixedWindowLimiter`]; the
//! [`AdmissionController`] routes a request to its tier's limiter and resolves
//! internal failures with the tier's failure policy.
//!
//! ## Example
//!
//! ```rust
//! use tollgate_core::{ClientId, Tier};
//! use tollgate_limiter::{AdmissionConfig, AdmissionController};
//!
//! let controller = AdmissionController::new(AdmissionConfig::default()).unwrap();
//! let client = ClientId::new("203.0.113.7");
//! assert!(controller.admit(Tier::PasswordReset, &client).is_allowed());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod controller;
mod window;

pub use controller::{AdmissionConfig, AdmissionController};
pub use window::FixedWindowLimiter;
