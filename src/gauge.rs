//! Atomic in-flight counter used as the crawl's quiescence signal.
//!
//! The source relies on this counter rather than a closeable queue because
//! producers (fetch tasks) and the single consumer (the engine loop) can
//! interleave; closing the frontier races with late pushes. Every push onto
//! the frontier is paired with an `increment`, and every terminal decision
//! for that URL — a successful fetch, a filter rejection, a robots
//! rejection, a cache-hit dedup, or any error branch — is paired with a
//! `decrement`. The gauge reaches zero exactly when the crawl is quiescent.

use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Gauge {
    count: AtomicI64,
    changed: Notify,
}

impl Gauge {
    pub fn new() -> Self {
        Self { count: AtomicI64::new(0), changed: Notify::new() }
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn decrement(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        // Wake the engine loop so it re-checks quiescence: the frontier may
        // stay empty forever once the crawl is done, so something has to
        // nudge a loop that would otherwise only wait on frontier/stop.
        self.changed.notify_one();
    }

    pub fn value(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }

    /// `true` iff the crawl is quiescent (no outstanding work).
    pub fn is_quiescent(&self) -> bool {
        self.value() < 1
    }

    /// Resolves after the next `decrement`, so a waiter can re-check
    /// `is_quiescent` without busy-polling.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_quiescent() {
        let g = Gauge::new();
        assert!(g.is_quiescent());
        assert_eq!(g.value(), 0);
    }

    #[test]
    fn increment_decrement_round_trip() {
        let g = Gauge::new();
        g.increment();
        g.increment();
        assert_eq!(g.value(), 2);
        assert!(!g.is_quiescent());
        g.decrement();
        assert!(!g.is_quiescent());
        g.decrement();
        assert!(g.is_quiescent());
    }

    #[tokio::test]
    async fn concurrent_increments_and_decrements_net_to_zero() {
        let g = Arc::new(Gauge::new());
        let mut handles = Vec::new();
        for _ in 0..100 {
            g.increment();
            let g = g.clone();
            handles.push(tokio::spawn(async move {
                g.decrement();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(g.is_quiescent());
        assert_eq!(g.value(), 0);
    }
}
