//! In-flight request accounting.
//!
//! # Responsibilities
//! - Track the number of requests currently being handled
//! - Guarantee at-most-once decrement per admitted request
//! - Expose the count for the drain waiter and probes
//!
//! # Design Decisions
//! - Counter is owned state passed by handle, not a module static
//! - Settle is a one-shot guarded by an atomic swap: a request may finish
//!   via either the "completed" or the "closed early" path, and both are
//!   allowed to fire
//! - Decrement saturates at zero

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Process-wide count of requests currently being handled.
///
/// Cloning shares the same underlying counter.
#[derive(Debug, Clone, Default)]
pub struct RequestCounter {
    active: Arc<AtomicU64>,
}

impl RequestCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request entering the service. Returns a guard whose
    /// settlement (explicit or on drop) decrements the count exactly once.
    pub fn enter(&self) -> RequestGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        metrics::record_request_started();
        RequestGuard {
            inner: Arc::new(GuardInner {
                active: Arc::clone(&self.active),
                settled: AtomicBool::new(false),
            }),
        }
    }

    /// Current number of in-flight requests. No side effects.
    pub fn current(&self) -> u64 {
        self.active.load(Ordering::Acquire)
    }
}

/// Completion token for a single admitted request.
///
/// Clones share the same one-shot settlement state; the transport layer's
/// "finished" and "closed" notifications can both hold a clone and only the
/// first settle decrements. Dropping the last clone settles implicitly.
#[derive(Debug, Clone)]
pub struct RequestGuard {
    inner: Arc<GuardInner>,
}

impl RequestGuard {
    /// Mark the request complete. Idempotent.
    pub fn settle(&self) {
        self.inner.settle();
    }

    /// Whether this request has already been settled.
    pub fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct GuardInner {
    active: Arc<AtomicU64>,
    settled: AtomicBool,
}

impl GuardInner {
    fn settle(&self) {
        if self.settled.swap(true, Ordering::AcqRel) {
            return;
        }
        // Floor at zero: a count below zero means a bookkeeping bug upstream,
        // never a negative number of requests.
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        metrics::record_request_settled();
    }
}

impl Drop for GuardInner {
    fn drop(&mut self) {
        self.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_tracks_enter_and_settle() {
        let counter = RequestCounter::new();
        assert_eq!(counter.current(), 0);

        let g1 = counter.enter();
        let g2 = counter.enter();
        assert_eq!(counter.current(), 2);

        g1.settle();
        assert_eq!(counter.current(), 1);

        drop(g2);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn duplicate_settle_decrements_once() {
        let counter = RequestCounter::new();
        let _held = counter.enter();
        let g = counter.enter();
        assert_eq!(counter.current(), 2);

        g.settle();
        g.settle();
        assert_eq!(counter.current(), 1);

        // Drop after explicit settle must not decrement again.
        drop(g);
        assert_eq!(counter.current(), 1);
    }

    #[test]
    fn clones_share_one_settlement() {
        let counter = RequestCounter::new();
        let g = counter.enter();
        let finished_path = g.clone();
        let closed_path = g.clone();

        finished_path.settle();
        closed_path.settle();
        drop(g);
        assert_eq!(counter.current(), 0);
        assert!(finished_path.is_settled());
    }

    #[test]
    fn count_never_goes_negative() {
        let counter = RequestCounter::new();
        let g = counter.enter();
        g.settle();
        assert_eq!(counter.current(), 0);

        // A fresh enter after draining to zero still works.
        let g2 = counter.enter();
        assert_eq!(counter.current(), 1);
        drop(g2);
        assert_eq!(counter.current(), 0);
    }
}
