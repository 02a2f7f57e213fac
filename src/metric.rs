//! Per-URL telemetry record.
//!
//! The four counters are lock-free (plain atomics) so callers that have
//! already obtained an `Arc<Metric>` from the cache never need to reacquire
//! the cache's lock just to count something. `duration`, `ref_links`, and
//! `ref_assets` are guarded by a `Mutex` since they aren't atomic types, but
//! each critical section is held only long enough to read or push a value —
//! never across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Per-URL counters and discovered-link bookkeeping.
///
/// Invariants: `received <= requested`; an `errored` increment implies
/// `received` is not also incremented for that fetch; `ref_links` and
/// `ref_assets` are appended to only during that URL's own fetch and are
/// frozen (read-only) afterwards.
#[derive(Debug, Default)]
pub struct Metric {
    requested: AtomicU64,
    received: AtomicU64,
    filtered: AtomicU64,
    errored: AtomicU64,
    duration: Mutex<Option<Duration>>,
    ref_links: Mutex<Vec<String>>,
    ref_assets: Mutex<Vec<String>>,
}

impl Metric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requested(&self) {
        self.requested.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_errored(&self) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }

    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }

    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::SeqCst)
    }

    pub fn errored(&self) -> u64 {
        self.errored.load(Ordering::SeqCst)
    }

    pub fn set_duration(&self, d: Duration) {
        *self.duration.lock().unwrap() = Some(d);
    }

    pub fn duration(&self) -> Option<Duration> {
        *self.duration.lock().unwrap()
    }

    pub fn push_link(&self, url: String) {
        self.ref_links.lock().unwrap().push(url);
    }

    pub fn push_asset(&self, url: String) {
        self.ref_assets.lock().unwrap().push(url);
    }

    pub fn ref_links(&self) -> Vec<String> {
        self.ref_links.lock().unwrap().clone()
    }

    pub fn ref_assets(&self) -> Vec<String> {
        self.ref_assets.lock().unwrap().clone()
    }
}
