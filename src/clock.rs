//! Lamport logical clock.
//!
//! A single atomic counter shared by every caller in a process. `tick`
//! advances it for a local event; `observe` folds in a value read from a
//! peer's `Lamport-Clock` header. Both return the new value, and under
//! concurrent callers every call returns a distinct value — the
//! compare-and-swap loop below is what guarantees that, the same way the
//! correlation-id counter elsewhere in this codebase guarantees distinct ids.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonic, thread-safe Lamport clock.
#[derive(Debug, Default)]
pub struct LamportClock {
    value: AtomicU64,
}

impl LamportClock {
    /// Create a new clock starting at zero.
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Record a local event, returning the new clock value.
    pub fn tick(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fold in a value observed from a peer message: `c <- max(c, v) + 1`.
    ///
    /// Implemented as a compare-and-swap loop so that concurrent callers
    /// each get their own distinct post-event value even when they observe
    /// the same remote clock.
    pub fn observe(&self, remote: u64) -> u64 {
        let mut current = self.value.load(Ordering::SeqCst);
        loop {
            let next = current.max(remote) + 1;
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Read the current value without mutating it.
    pub fn read(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn tick_is_monotonic() {
        let clock = LamportClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(b > a);
    }

    #[test]
    fn observe_takes_max_plus_one() {
        let clock = LamportClock::new();
        clock.tick(); // clock = 1
        let v = clock.observe(10);
        assert_eq!(v, 11);
        let v2 = clock.observe(3);
        assert_eq!(v2, 12);
    }

    #[test]
    fn concurrent_calls_never_collide() {
        let clock = Arc::new(LamportClock::new());
        let mut handles = Vec::new();
        for i in 0..50u64 {
            let clock = clock.clone();
            handles.push(std::thread::spawn(move || {
                if i % 2 == 0 {
                    clock.tick()
                } else {
                    clock.observe(i)
                }
            }));
        }
        let mut values: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        values.sort_unstable();
        let before = values.len();
        values.dedup();
        assert_eq!(values.len(), before, "every call must produce a distinct value");
    }
}
