//! Price levels and the entries they exclusively own.
//!
//! A `PriceLevel` aggregates size at one (price, side) and owns an ordered
//! collection of `Entry` records. Entry order is arrival order within the
//! level, which the delta accumulator relies on for complex-delta ordering.
//!
//! The aggregate `size` and `entry_count` are maintained explicitly rather
//! than derived: an update message may carry an explicit level size that
//! overrides the sum of its entries, and entry-less feeds report a count with
//! no entry detail at all.

use serde::{Deserialize, Serialize};

use crate::types::{EntryStatus, Side};

/// One individual order contributing to a level's size.
///
/// Owned exclusively by its `PriceLevel`; the global entry-manager index
/// refers to entries by identifier and level coordinates only, never by an
/// ownership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Feed-assigned entry identifier
    pub id: String,
    /// Current size
    pub size: u64,
    /// Last update time (nanoseconds since epoch)
    pub time: u64,
    /// Venue-reported status
    pub status: EntryStatus,
}

impl Entry {
    pub fn new(id: impl Into<String>, size: u64, time: u64) -> Self {
        Self {
            id: id.into(),
            size,
            time,
            status: EntryStatus::Active,
        }
    }
}

/// An aggregation of size at one price/side, unique within a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    price: i64,
    side: Side,
    size: u64,
    entry_count: u32,
    time: u64,
    entries: Vec<Entry>,
}

impl PriceLevel {
    /// Create an empty level at a normalized fixed-point price.
    pub fn new(price: i64, side: Side) -> Self {
        Self {
            price,
            side,
            size: 0,
            entry_count: 0,
            time: 0,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn price(&self) -> i64 {
        self.price
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    #[inline]
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Explicit size from the message; overrides any inferred adjustment.
    #[inline]
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    /// Explicit entry count from the message (entry-less feeds report this
    /// without any entry detail).
    #[inline]
    pub fn set_entry_count(&mut self, count: u32) {
        self.entry_count = count;
    }

    #[inline]
    pub fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    /// Inferred size adjustment from entry arithmetic, saturating at zero.
    #[inline]
    pub fn adjust_size(&mut self, delta: i64) {
        if delta >= 0 {
            self.size = self.size.saturating_add(delta as u64);
        } else {
            self.size = self.size.saturating_sub(delta.unsigned_abs());
        }
    }

    /// Find an entry by identifier (levels hold few entries; linear scan).
    pub fn find_entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_entry_mut(&mut self, id: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Append a new entry, maintaining arrival order and the entry count.
    ///
    /// Callers resolve duplicates through `find_entry_mut` first; this does
    /// not deduplicate.
    pub fn push_entry(&mut self, entry: Entry) -> &mut Entry {
        self.entry_count = self.entry_count.saturating_add(1);
        self.entries.push(entry);
        self.entries.last_mut().expect("just pushed")
    }

    /// Remove an entry by identifier, returning it if present.
    pub fn remove_entry(&mut self, id: &str) -> Option<Entry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        self.entry_count = self.entry_count.saturating_sub(1);
        Some(self.entries.remove(idx))
    }

    /// Iterate entries in arrival order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    #[inline]
    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Discard all entries and zero the aggregates.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.entry_count = 0;
        self.size = 0;
    }
}
