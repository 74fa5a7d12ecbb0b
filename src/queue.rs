//! Per-backend in-flight request counters.
//!
//! Modeled on [`crate::state`]'s original `TaskManager`: a
//! `Mutex`-guarded map keyed by a stable string id, generalized here from
//! abort handles to atomic counters. Counters are keyed by backend *name*
//! rather than embedded in the (refreshed, cloned) `Backend` value itself,
//! so a backend's in-flight count survives a config-snapshot refresh as
//! long as the same name reappears in the new snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Tracks in-flight request counts per backend name.
#[derive(Default)]
pub struct QueueAccountant {
    counters: Mutex<HashMap<String, Arc<AtomicI64>>>,
}

impl QueueAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter_for(&self, backend_name: &str) -> Arc<AtomicI64> {
        let mut map = self.counters.lock().expect("queue accountant mutex poisoned");
        map.entry(backend_name.to_owned())
            .or_insert_with(|| Arc::new(AtomicI64::new(0)))
            .clone()
    }

    /// Increment the in-flight count for `backend_name`. Must be paired
    /// with a [`Self::dec`] on every exit path, including error paths.
    pub fn inc(&self, backend_name: &str) {
        self.counter_for(backend_name).fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the in-flight count for `backend_name`.
    pub fn dec(&self, backend_name: &str) {
        self.counter_for(backend_name).fetch_sub(1, Ordering::SeqCst);
    }

    /// Current in-flight depth for `backend_name` (0 if never seen).
    pub fn depth(&self, backend_name: &str) -> i64 {
        self.counter_for(backend_name).load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;

    #[test]
    fn inc_dec_round_trip_returns_to_zero() {
        let q = QueueAccountant::new();
        assert_eq!(q.depth("a"), 0);
        q.inc("a");
        q.inc("a");
        assert_eq!(q.depth("a"), 2);
        q.dec("a");
        q.dec("a");
        assert_eq!(q.depth("a"), 0);
    }

    #[test]
    fn counters_are_independent_per_backend() {
        let q = QueueAccountant::new();
        q.inc("a");
        assert_eq!(q.depth("a"), 1);
        assert_eq!(q.depth("b"), 0);
    }

    #[test]
    fn concurrent_inc_dec_preserves_conservation() {
        let q = StdArc::new(QueueAccountant::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let q = StdArc::clone(&q);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    q.inc("shared");
                    q.dec("shared");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.depth("shared"), 0);
    }
}
