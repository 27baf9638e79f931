//! Host-wide call rate limiter.
//!
//! A token bucket sized in calls per minute, shared by all workers on the
//! host. Capacity equals the per-minute budget, so a fresh engine can burst
//! a full minute's worth and then sustains the steady rate.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiting placement attempts per minute.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    /// Create a limiter allowing `per_minute` calls per minute.
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = f64::from(per_minute.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / 60.0,
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Block the calling thread until a token is available.
    ///
    /// Workers run on dedicated OS threads, so a short sleep-poll here costs
    /// nothing elsewhere.
    pub fn acquire_blocking(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            std::thread::sleep(self.time_to_next_token());
        }
    }

    /// How long until one token will have accumulated.
    fn time_to_next_token(&self) -> Duration {
        let state = self.lock();
        let missing = (1.0 - state.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.refill_per_sec)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
