//! Mock placer for development and tests.
//!
//! Simulates a telephony provider: waits a configurable latency, then
//! connects with a configurable probability. The generator is seedable so
//! tests can pin the outcome sequence.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::Error;
use crate::models::call::{CallOutcome, CallRequest};
use crate::providers::CallPlacer;

/// Latency of the simulated call attempt.
const DEFAULT_LATENCY: Duration = Duration::from_secs(2);
/// Probability that a simulated attempt connects.
const DEFAULT_SUCCESS_RATE: f64 = 0.9;

/// A placer that pretends to dial.
pub struct MockPlacer {
    latency: Duration,
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl MockPlacer {
    /// Create a mock with production-like behavior: 2s per call, 90% connect.
    pub fn new() -> Self {
        Self::with_behavior(DEFAULT_LATENCY, DEFAULT_SUCCESS_RATE)
    }

    /// Create a mock with explicit latency and connect probability.
    ///
    /// `success_rate` is clamped to `[0.0, 1.0]`.
    pub fn with_behavior(latency: Duration, success_rate: f64) -> Self {
        Self {
            latency,
            success_rate: success_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a deterministic mock for tests.
    pub fn seeded(latency: Duration, success_rate: f64, seed: u64) -> Self {
        Self {
            latency,
            success_rate: success_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A mock that always connects immediately. Handy in unit tests.
    pub fn always_connects() -> Self {
        Self::seeded(Duration::ZERO, 1.0, 0)
    }

    /// A mock that never connects and reports immediately.
    pub fn never_connects() -> Self {
        Self::seeded(Duration::ZERO, 0.0, 0)
    }

    fn roll(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_bool(self.success_rate)
    }
}

impl Default for MockPlacer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallPlacer for MockPlacer {
    async fn place(&self, _request: CallRequest) -> Result<CallOutcome, Error> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.roll() {
            Ok(CallOutcome::Connected)
        } else {
            Ok(CallOutcome::NotConnected {
                reason: "no-answer".into(),
            })
        }
    }
}
