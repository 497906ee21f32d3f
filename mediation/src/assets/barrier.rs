//! Fan-out completion barrier.
//!
//! A fixed number of concurrent sub-operations each call [`arrive`] exactly
//! once. The completion callback runs exactly once, on whichever arrival
//! takes the counter from one to zero.
//!
//! [`arrive`]: CompletionBarrier::arrive

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

type Completion = Box<dyn FnOnce() + Send>;

pub struct CompletionBarrier {
    remaining: AtomicUsize,
    on_complete: Mutex<Option<Completion>>,
}

impl fmt::Debug for CompletionBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBarrier")
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

impl CompletionBarrier {
    /// Create a barrier expecting `count` arrivals.
    ///
    /// A zero count completes immediately.
    pub fn new<F>(count: usize, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let barrier = Self {
            remaining: AtomicUsize::new(count),
            on_complete: Mutex::new(Some(Box::new(on_complete))),
        };
        if count == 0 {
            barrier.complete();
        }
        barrier
    }

    /// Record one arrival. Returns `true` for the arrival that completed
    /// the barrier.
    ///
    /// Decrement and zero check are one atomic step. Arrivals beyond the
    /// expected count are ignored.
    pub fn arrive(&self) -> bool {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => {
                self.complete();
                true
            }
            Ok(_) => false,
            Err(_) => {
                tracing::warn!("Completion barrier arrival after completion ignored");
                false
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    fn complete(&self) {
        if let Some(callback) = self.on_complete.lock().take() {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn counting_barrier(count: usize) -> (CompletionBarrier, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let barrier = CompletionBarrier::new(count, move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        (barrier, fired)
    }

    #[test]
    fn test_fires_on_last_arrival() {
        let (barrier, fired) = counting_barrier(2);

        assert!(!barrier.arrive());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(barrier.arrive());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(barrier.is_complete());
    }

    #[test]
    fn test_extra_arrivals_ignored() {
        let (barrier, fired) = counting_barrier(1);

        assert!(barrier.arrive());
        assert!(!barrier.arrive());
        assert!(!barrier.arrive());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(barrier.remaining(), 0);
    }

    #[test]
    fn test_zero_count_fires_immediately() {
        let (barrier, fired) = counting_barrier(0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!barrier.arrive());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_arrivals_fire_once() {
        const THREADS: usize = 16;
        let (barrier, fired) = counting_barrier(THREADS);
        let barrier = Arc::new(barrier);

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || barrier.arrive())
            })
            .collect();

        let completions = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|completed| *completed)
            .count();

        assert_eq!(completions, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
