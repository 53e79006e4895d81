//! Slot pool owning every live connection.
//!
//! # Responsibilities
//! - Bind new connections to a free slot, growing only when none is free
//! - Release slots on disconnect and make them available for reuse
//! - Report occupancy for status logging
//!
//! # Design Decisions
//! - Free slots are reused LIFO, so the most recently freed index goes first
//! - The slot vector never shrinks; its length is the peak of concurrent connections
//! - Releasing an empty slot is a no-op, so a slot index is never free twice

use crate::net::connection::Connection;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Length of the slot vector.
    pub slots: usize,
    /// Occupied slots.
    pub active: usize,
    /// Slots waiting for reuse.
    pub free: usize,
    /// Highest number of simultaneously occupied slots seen.
    pub peak: usize,
}

/// Growable slot storage with free-index reuse.
#[derive(Debug)]
pub struct ConnectionPool<C = Connection> {
    slots: Vec<Option<C>>,
    free: Vec<usize>,
    active: usize,
    peak: usize,
}

impl<C> Default for ConnectionPool<C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            active: 0,
            peak: 0,
        }
    }
}

impl<C> ConnectionPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot the next [`bind`](Self::bind) will use.
    pub fn next_slot(&self) -> usize {
        self.free.last().copied().unwrap_or(self.slots.len())
    }

    /// Place the value built by `make` into a slot and return the slot index.
    ///
    /// `make` receives the index so the value can remember where it lives.
    pub fn bind(&mut self, make: impl FnOnce(usize) -> C) -> usize {
        let slot = match self.free.pop() {
            Some(slot) => {
                debug_assert!(self.slots[slot].is_none(), "free slot {slot} is occupied");
                self.slots[slot] = Some(make(slot));
                slot
            }
            None => {
                let slot = self.slots.len();
                self.slots.push(Some(make(slot)));
                slot
            }
        };
        self.active += 1;
        self.peak = self.peak.max(self.active);
        slot
    }

    /// Empty `slot` and queue it for reuse. Returns the previous occupant.
    pub fn release(&mut self, slot: usize) -> Option<C> {
        self.release_if(slot, |_| true)
    }

    /// Like [`release`](Self::release), but only when `pred` accepts the occupant.
    pub fn release_if(&mut self, slot: usize, pred: impl FnOnce(&C) -> bool) -> Option<C> {
        let entry = self.slots.get_mut(slot)?;
        if !entry.as_ref().is_some_and(pred) {
            return None;
        }
        let occupant = entry.take();
        self.free.push(slot);
        self.active -= 1;
        occupant
    }

    pub fn get(&self, slot: usize) -> Option<&C> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut C> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Occupied slots with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &C)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|c| (slot, c)))
    }

    /// Length of the slot vector (occupied and free).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            slots: self.slots.len(),
            active: self.active,
            free: self.free.len(),
            peak: self.peak,
        }
    }
}
