//! Capacity Ledger
//!
//! Tracks how many customers are inside and how many have entered in
//! total, never letting the occupancy leave `0..=max_capacity`.
//!
//! ## Concurrency
//! Both counters live behind one `parking_lot::Mutex`, so a check and its
//! update are a single critical section and snapshots are never torn.

use std::fmt;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Counts {
    total_entrants: u64,
    customers_in_store: usize,
}

/// Process-wide occupancy state of the store
#[derive(Debug)]
pub struct CapacityLedger {
    max_capacity: usize,
    counts: Mutex<Counts>,
}

/// Consistent point-in-time view of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub total_entrants: u64,
    pub customers_in_store: usize,
    pub max_capacity: usize,
}

impl LedgerSnapshot {
    /// Entries still available before the store is full
    pub fn remaining(&self) -> usize {
        self.max_capacity.saturating_sub(self.customers_in_store)
    }

    pub fn is_full(&self) -> bool {
        self.customers_in_store >= self.max_capacity
    }
}

impl fmt::Display for LedgerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----- Smart Store Access System -----")?;
        writeln!(f, "The total number of entrants:  {}", self.total_entrants)?;
        writeln!(f, "Customers in the store:        {}", self.customers_in_store)?;
        writeln!(f, "Remaining entries:             {}", self.remaining())?;
        write!(f, "------------------------------------")
    }
}

impl CapacityLedger {
    /// Create an empty ledger
    pub fn new(max_capacity: usize) -> Self {
        Self {
            max_capacity,
            counts: Mutex::new(Counts::default()),
        }
    }

    /// Admit one customer if there is room
    ///
    /// Returns false and changes nothing when the store is full.
    pub fn try_enter(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.customers_in_store < self.max_capacity {
            counts.customers_in_store += 1;
            counts.total_entrants += 1;
            true
        } else {
            false
        }
    }

    /// Record one customer leaving
    ///
    /// Returns false when the store is already empty.
    pub fn try_leave(&self) -> bool {
        let mut counts = self.counts.lock();
        if counts.customers_in_store > 0 {
            counts.customers_in_store -= 1;
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let counts = self.counts.lock();
        LedgerSnapshot {
            total_entrants: counts.total_entrants,
            customers_in_store: counts.customers_in_store,
            max_capacity: self.max_capacity,
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}
