//! Telephony placement abstraction.
//!
//! This crate defines the [`providers::CallPlacer`] trait — the seam between
//! the campaign execution plane and whatever actually dials a phone number —
//! together with the request/outcome models and a mock implementation used in
//! development and tests.

pub mod errors;
pub mod models;
pub mod providers;
