//! One-shot latch.

use std::sync::atomic::{AtomicBool, Ordering};

/// A flag that can be set exactly once.
///
/// [`try_set`](Self::try_set) returns `true` only for the first caller, no
/// matter how many threads race on it.
#[derive(Debug, Default)]
pub struct OneShotLatch {
    set: AtomicBool,
}

impl OneShotLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch. Returns `true` if this call set it.
    pub fn try_set(&self) -> bool {
        self.set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_set_wins() {
        let latch = OneShotLatch::new();
        assert!(!latch.is_set());
        assert!(latch.try_set());
        assert!(!latch.try_set());
        assert!(latch.is_set());
    }

    #[test]
    fn test_concurrent_set_single_winner() {
        let latch = Arc::new(OneShotLatch::new());
        let winners: usize = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || latch.try_set())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
    }
}
