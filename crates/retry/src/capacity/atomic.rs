// Lock-free capacity cell shared by all concurrent attempts of one client
use std::sync::atomic::{AtomicU32, Ordering};

/// Result of a successful [`AtomicCapacity::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquisition {
    /// Amount removed from the cell by this acquisition.
    pub acquired: u32,
    /// Amount left in the cell immediately after this acquisition.
    pub remaining: u32,
}

/// A bounded integer capacity with linearizable acquire and release.
///
/// The cell never drops below zero and never exceeds the maximum it was
/// created with. All mutation goes through a compare-and-swap loop over a
/// single atomic integer; contention retries, it never blocks.
#[derive(Debug)]
pub struct AtomicCapacity {
    max_capacity: u32,
    capacity: AtomicU32,
}

impl AtomicCapacity {
    /// Create a cell holding `capacity` units, which is also its maximum.
    pub fn new(capacity: u32) -> Self {
        Self { max_capacity: capacity, capacity: AtomicU32::new(capacity) }
    }

    /// Atomically remove `amount` units.
    ///
    /// Acquiring zero always succeeds and reports the current value without
    /// mutating the cell. Otherwise the acquisition succeeds only if the
    /// full amount is available; a cell that would cross zero is left
    /// untouched and `None` is returned.
    pub fn try_acquire(&self, amount: u32) -> Option<Acquisition> {
        if amount == 0 {
            return Some(Acquisition {
                acquired: 0,
                remaining: self.capacity.load(Ordering::Acquire),
            });
        }

        loop {
            let current = self.capacity.load(Ordering::Acquire);
            let remaining = current.checked_sub(amount)?;

            match self.capacity.compare_exchange_weak(
                current,
                remaining,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(Acquisition { acquired: amount, remaining }),
                Err(_) => continue, // Retry on concurrent modification
            }
        }
    }

    /// Return `amount` units to the cell, saturating at the maximum.
    pub fn release(&self, amount: u32) {
        if amount == 0 {
            return;
        }

        loop {
            let current = self.capacity.load(Ordering::Acquire);
            if current == self.max_capacity {
                return;
            }

            let replenished = current.saturating_add(amount).min(self.max_capacity);
            match self.capacity.compare_exchange_weak(
                current,
                replenished,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    /// Current number of units in the cell.
    pub fn current_capacity(&self) -> u32 {
        self.capacity.load(Ordering::Acquire)
    }

    /// Maximum number of units the cell can hold.
    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }
}
