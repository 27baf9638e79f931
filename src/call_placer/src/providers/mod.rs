//! Placer abstraction for telephony backends.
//!
//! This module defines the [`CallPlacer`] trait, the unified interface for
//! placing an outbound call through any telephony vendor. Each concrete
//! implementation handles vendor-specific API logic; the engine only sees
//! request in, outcome out.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`Arc<dyn CallPlacer>`) so the backend can be selected at runtime.
//!
//! Contract for implementors:
//! - `place` must eventually resolve; callers impose their own deadline and
//!   treat expiry as a failed attempt.
//! - `place` is invoked at most once per call-log row.
//! - A call that was attempted but did not connect is an `Ok(NotConnected)`,
//!   not an `Err`; errors are reserved for transport/infrastructure faults,
//!   surfaced through the crate-level [`Error`](crate::errors::Error).

pub mod errors;
pub mod mock;

use async_trait::async_trait;

use crate::errors::Error;
use crate::models::call::{CallOutcome, CallRequest};

/// Interface for placing a single outbound call.
#[async_trait]
pub trait CallPlacer: Send + Sync {
    /// Place the call described by `request` and report how it went.
    async fn place(&self, request: CallRequest) -> Result<CallOutcome, Error>;
}
