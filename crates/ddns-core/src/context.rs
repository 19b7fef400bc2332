//! Shared state between the change monitor and the reconciliation loop
//!
//! One mutex guards the pending flag, the known-address set and the
//! elapsed-time counter. Every method takes the lock for a handful of
//! field operations only; none of them is ever called across I/O.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug)]
struct ContextState {
    pending: bool,
    known: HashSet<String>,
    since_refresh: Duration,
}

/// Daemon-lifetime coordination state
#[derive(Debug)]
pub struct ReconciliationContext {
    inner: Mutex<ContextState>,
}

impl Default for ReconciliationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationContext {
    /// A fresh context with the trigger set, so the first tick reconciles.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ContextState {
                pending: true,
                known: HashSet::new(),
                since_refresh: Duration::ZERO,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        // Every update is a single field write; poisoned state is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the trigger. Repeated calls before the next tick coalesce.
    pub fn request_reconcile(&self) {
        self.lock().pending = true;
    }

    /// Set the trigger if `address` was not present at the last pass.
    ///
    /// Returns whether the trigger was set.
    pub fn note_new_address(&self, address: &str) -> bool {
        let mut state = self.lock();
        if state.known.contains(address) {
            return false;
        }
        state.pending = true;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn is_known(&self, address: &str) -> bool {
        self.lock().known.contains(address)
    }

    pub fn known_addresses(&self) -> HashSet<String> {
        self.lock().known.clone()
    }

    pub fn since_refresh(&self) -> Duration {
        self.lock().since_refresh
    }

    /// Claim a pass if one is due.
    ///
    /// A pass is due when the trigger is set or more than `force_refresh`
    /// has elapsed since the last one. Claiming clears the trigger and
    /// resets the counter in the same critical section, so events arriving
    /// while the pass runs re-arm the trigger for the next tick.
    pub fn try_begin_pass(&self, force_refresh: Duration) -> bool {
        let mut state = self.lock();
        if !state.pending && state.since_refresh <= force_refresh {
            return false;
        }
        state.pending = false;
        state.since_refresh = Duration::ZERO;
        true
    }

    /// Set the trigger again after a failed pass so the next tick retries.
    pub fn rearm(&self) {
        self.lock().pending = true;
    }

    /// Replace the known-address set with the one observed by the last pass.
    pub fn replace_known(&self, observed: HashSet<String>) {
        self.lock().known = observed;
    }

    /// Account for one idle tick.
    pub fn advance(&self, elapsed: Duration) {
        let mut state = self.lock();
        state.since_refresh = state.since_refresh.saturating_add(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn first_pass_is_due_immediately() {
        let ctx = ReconciliationContext::new();
        assert!(ctx.is_pending());
        assert!(ctx.try_begin_pass(HOUR));
        assert!(!ctx.is_pending());
        assert!(!ctx.try_begin_pass(HOUR), "a claimed trigger is consumed");
    }

    #[test]
    fn refresh_is_due_only_after_period_is_exceeded() {
        let ctx = ReconciliationContext::new();
        assert!(ctx.try_begin_pass(HOUR));

        ctx.advance(HOUR);
        assert!(!ctx.try_begin_pass(HOUR), "exactly one period is not enough");

        ctx.advance(Duration::from_secs(60));
        assert!(ctx.try_begin_pass(HOUR));
        assert_eq!(ctx.since_refresh(), Duration::ZERO);
    }

    #[test]
    fn triggers_coalesce() {
        let ctx = ReconciliationContext::new();
        assert!(ctx.try_begin_pass(HOUR));

        ctx.request_reconcile();
        ctx.request_reconcile();
        ctx.request_reconcile();
        assert!(ctx.try_begin_pass(HOUR));
        assert!(!ctx.try_begin_pass(HOUR));
    }

    #[test]
    fn known_addresses_do_not_trigger() {
        let ctx = ReconciliationContext::new();
        assert!(ctx.try_begin_pass(HOUR));
        ctx.replace_known(["85.207.1.2".to_string()].into_iter().collect());

        assert!(!ctx.note_new_address("85.207.1.2"));
        assert!(!ctx.is_pending());

        assert!(ctx.note_new_address("85.207.1.3"));
        assert!(ctx.is_pending());
    }

    #[test]
    fn failed_pass_rearms_trigger() {
        let ctx = ReconciliationContext::new();
        assert!(ctx.try_begin_pass(HOUR));
        ctx.rearm();
        assert!(ctx.is_pending());
    }
}
