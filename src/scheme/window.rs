//! Sequence window for classifying streaming arrivals.
//!
//! The window remembers the highest sequence number seen and the gap numbers
//! below it that have not arrived yet. Only the `horizon` numbers directly
//! below the highest are tracked; gap numbers that fall out of that range are
//! forgotten and stay lost.

use std::collections::BTreeSet;

/// How an arriving sequence number relates to what came before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// New highest number. `skipped` numbers between the previous highest
    /// and this one have not been seen.
    InOrder { skipped: u64 },
    /// Fills a previously recorded gap.
    OutOfOrder,
    /// Already seen within the horizon.
    Duplicate,
    /// Below the horizon; cannot be told apart from a duplicate.
    Late,
}

#[derive(Debug, Clone)]
pub struct SequenceWindow {
    highest: Option<u64>,
    missing: BTreeSet<u64>,
    horizon: u64,
}

impl SequenceWindow {
    pub fn new(horizon: u64) -> Self {
        Self {
            highest: None,
            missing: BTreeSet::new(),
            horizon: horizon.max(1),
        }
    }

    pub fn highest(&self) -> Option<u64> {
        self.highest
    }

    /// Gap numbers inside the horizon still waiting to arrive.
    pub fn pending(&self) -> usize {
        self.missing.len()
    }

    /// Lowest number still inside the horizon.
    fn floor(&self, highest: u64) -> u64 {
        highest.saturating_sub(self.horizon)
    }

    pub fn observe(&mut self, sequence: u64) -> Arrival {
        match self.highest {
            Some(highest) if sequence <= highest => {
                if sequence < self.floor(highest) {
                    Arrival::Late
                } else if self.missing.remove(&sequence) {
                    Arrival::OutOfOrder
                } else {
                    Arrival::Duplicate
                }
            }
            previous => {
                // Sequences start at 0, so before the first arrival the
                // previous highest is effectively -1.
                let first_skipped = previous.map_or(0, |h| h + 1);
                let skipped = sequence - first_skipped;

                let floor = self.floor(sequence);
                self.missing.extend(first_skipped.max(floor)..sequence);
                if self.missing.first().map_or(false, |low| *low < floor) {
                    self.missing = self.missing.split_off(&floor);
                }

                self.highest = Some(sequence);
                Arrival::InOrder { skipped }
            }
        }
    }
}
