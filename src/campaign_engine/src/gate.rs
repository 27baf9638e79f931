//! Per-campaign concurrency gate.
//!
//! A keyed counter bounding in-flight calls per campaign. Acquisition is
//! increment-then-compare under one lock, so the cap cannot be overshot; a
//! successful acquire hands back a [`SlotGuard`] that releases the slot when
//! dropped, covering every exit path of the worker state machine, panics
//! included.
//!
//! The counter is the only non-durable state in the engine. It can drift
//! upward if a worker dies between acquire and release; [`Gate::reset`] is
//! the operator lever for that, and [`Gate::active`] supports a periodic
//! sanity check against the count of in-progress tasks. No automatic
//! reconciliation is attempted.

use std::collections::HashMap;
use std::sync::Mutex;

/// Shared per-campaign active-call counters.
#[derive(Debug, Default)]
pub struct Gate {
    counters: Mutex<HashMap<String, u32>>,
}

impl Gate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take one slot for `campaign_id` under `cap`.
    ///
    /// Returns a guard on success; the guard releases the slot on drop.
    /// `cap <= 0` denies everything (a malformed campaign row must not dial
    /// unbounded).
    pub fn try_acquire<'g>(&'g self, campaign_id: &str, cap: i32) -> Option<SlotGuard<'g>> {
        if cap <= 0 {
            return None;
        }
        let mut counters = self.lock();
        let active = counters.entry(campaign_id.to_string()).or_insert(0);
        if *active >= cap as u32 {
            return None;
        }
        *active += 1;
        Some(SlotGuard {
            gate: self,
            campaign_id: campaign_id.to_string(),
        })
    }

    /// Current active count for a campaign.
    pub fn active(&self, campaign_id: &str) -> u32 {
        self.lock().get(campaign_id).copied().unwrap_or(0)
    }

    /// Operator reset: clear a campaign's counter after drift.
    pub fn reset(&self, campaign_id: &str) {
        self.lock().remove(campaign_id);
    }

    fn release(&self, campaign_id: &str) {
        let mut counters = self.lock();
        if let Some(active) = counters.get_mut(campaign_id) {
            *active = active.saturating_sub(1);
            if *active == 0 {
                counters.remove(campaign_id);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        // A poisoned counter map is still structurally sound; keep serving.
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// RAII slot handle; dropping it releases the slot.
#[derive(Debug)]
pub struct SlotGuard<'a> {
    gate: &'a Gate,
    campaign_id: String,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(&self.campaign_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn cap_is_enforced() {
        let gate = Gate::new();
        let a = gate.try_acquire("camp-1", 2);
        let b = gate.try_acquire("camp-1", 2);
        let c = gate.try_acquire("camp-1", 2);
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
        assert_eq!(gate.active("camp-1"), 2);
    }

    #[test]
    fn campaigns_are_independent() {
        let gate = Gate::new();
        let _a = gate.try_acquire("camp-1", 1).unwrap();
        assert!(gate.try_acquire("camp-1", 1).is_none());
        assert!(gate.try_acquire("camp-2", 1).is_some());
    }

    #[test]
    fn drop_releases_slot() {
        let gate = Gate::new();
        {
            let _guard = gate.try_acquire("camp-1", 1).unwrap();
            assert_eq!(gate.active("camp-1"), 1);
        }
        assert_eq!(gate.active("camp-1"), 0);
        assert!(gate.try_acquire("camp-1", 1).is_some());
    }

    #[test]
    fn release_runs_on_panic() {
        let gate = Arc::new(Gate::new());
        let gate_clone = Arc::clone(&gate);
        let result = std::panic::catch_unwind(move || {
            let _guard = gate_clone.try_acquire("camp-1", 1).unwrap();
            panic!("worker died");
        });
        assert!(result.is_err());
        assert_eq!(gate.active("camp-1"), 0);
    }

    #[test]
    fn reset_clears_drift() {
        let gate = Gate::new();
        let guard = gate.try_acquire("camp-1", 3).unwrap();
        // Simulate drift repair while a slot is held.
        gate.reset("camp-1");
        assert_eq!(gate.active("camp-1"), 0);
        // The stale guard's release must not underflow.
        drop(guard);
        assert_eq!(gate.active("camp-1"), 0);
    }

    #[test]
    fn nonpositive_cap_denies() {
        let gate = Gate::new();
        assert!(gate.try_acquire("camp-1", 0).is_none());
        assert!(gate.try_acquire("camp-1", -1).is_none());
    }

    #[test]
    fn concurrent_acquirers_never_exceed_cap() {
        let gate = Arc::new(Gate::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            handles.push(std::thread::spawn(move || {
                let mut won = 0u32;
                for _ in 0..200 {
                    if let Some(guard) = gate.try_acquire("camp-1", 3) {
                        assert!(gate.active("camp-1") <= 3);
                        won += 1;
                        drop(guard);
                    }
                }
                won
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gate.active("camp-1"), 0);
    }
}
