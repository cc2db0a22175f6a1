use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe byte counter that never goes negative.
///
/// Deposits always succeed; a withdrawal larger than the current value is refused and
/// leaves the counter unchanged.
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new `Counter` with the given initial amount.
    pub fn new(amount: u64) -> Counter {
        Counter(AtomicU64::new(amount))
    }

    /// Attempts to withdraw the specified `amount` from the counter.
    ///
    /// Returns `true` if the withdrawal took place, `false` if the counter holds less
    /// than `amount` (in which case it is not modified).
    pub fn withdraw(&self, amount: u64) -> bool {
        let mut current = self.0.load(Ordering::Relaxed);
        while current >= amount {
            match self.0.compare_exchange_weak(
                current,
                current - amount,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated) => current = updated,
            }
        }
        false
    }

    /// Adds `amount` to the counter.
    pub fn deposit(&self, amount: u64) {
        self.0.fetch_add(amount, Ordering::Release);
    }

    /// Returns the counter value.
    pub fn read(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Resets the counter to 0, returning the previous value.
    pub fn drain(&self) -> u64 {
        self.0.swap(0, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Counter").field(&self.read()).finish()
    }
}
