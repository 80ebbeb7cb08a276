//! The order book proper: ordered level storage per side, synthetic
//! market-order levels, and the optional global entry index.
//!
//! Level lookup is price-keyed through a `BTreeMap` so each side stays
//! price-ordered (best bid = highest key, best ask = lowest key). Deleted
//! levels are detached into a holding area and only reaped by [`OrderBook::sweep`]
//! after consumers have been notified, so delta records built during a
//! dispatch cycle never observe a half-torn-down book.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::level::{Entry, PriceLevel};
use crate::types::{BookQuality, LevelAction, Side};

/// Full set of price levels (and optional market-order levels) for one
/// instrument. Created once per tracked subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    symbol: String,
    /// Bid levels keyed by price; best bid is the highest key.
    bids: BTreeMap<i64, PriceLevel>,
    /// Ask levels keyed by price; best ask is the lowest key.
    asks: BTreeMap<i64, PriceLevel>,
    /// Synthetic market-order levels, outside normal price ordering.
    bid_market_order: Option<PriceLevel>,
    ask_market_order: Option<PriceLevel>,
    consistent: bool,
    quality: BookQuality,
    /// Book time from the most recent message (nanoseconds since epoch).
    book_time: u64,
    /// Detached levels awaiting the post-dispatch sweep.
    #[serde(skip)]
    detached: Vec<PriceLevel>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            bid_market_order: None,
            ask_market_order: None,
            consistent: false,
            quality: BookQuality::Unknown,
            book_time: 0,
            detached: Vec::new(),
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    fn side_map(&self, side: Side) -> &BTreeMap<i64, PriceLevel> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    fn side_map_mut(&mut self, side: Side) -> &mut BTreeMap<i64, PriceLevel> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Find an existing level at a normalized price.
    pub fn find_level(&self, price: i64, side: Side) -> Option<&PriceLevel> {
        self.side_map(side).get(&price)
    }

    pub fn find_level_mut(&mut self, price: i64, side: Side) -> Option<&mut PriceLevel> {
        self.side_map_mut(side).get_mut(&price)
    }

    /// Resolve a level for the requested action, creating on demand.
    ///
    /// Returns `None` when the action is a delete and no such level exists
    /// (the caller treats this as a no-op). Otherwise returns the level and
    /// the *actual* action: an add on an existing level is normalized to
    /// update, and an update (or unknown) on a missing level becomes an add.
    pub fn find_or_create_level(
        &mut self,
        price: i64,
        side: Side,
        requested: LevelAction,
    ) -> Option<(&mut PriceLevel, LevelAction)> {
        let map = self.side_map_mut(side);
        let existed = map.contains_key(&price);
        if !existed && requested == LevelAction::Delete {
            return None;
        }
        let level = map
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price, side));
        let actual = if !existed {
            LevelAction::Add
        } else if requested == LevelAction::Add {
            LevelAction::Update
        } else {
            requested
        };
        Some((level, actual))
    }

    /// Unlink a level from the active index.
    ///
    /// The level is parked until [`OrderBook::sweep`] so any delta records
    /// built from it this cycle stay coherent until consumers are notified.
    pub fn detach_level(&mut self, price: i64, side: Side) -> bool {
        match self.side_map_mut(side).remove(&price) {
            Some(level) => {
                self.detached.push(level);
                true
            }
            None => false,
        }
    }

    /// Reap levels detached during the last dispatch cycle.
    pub fn sweep(&mut self) -> usize {
        let n = self.detached.len();
        self.detached.clear();
        n
    }

    /// Resolve the synthetic market-order level for a side, creating it on
    /// first reference. Market-order levels bypass price ordering entirely.
    pub fn market_order_level_mut(&mut self, side: Side) -> &mut PriceLevel {
        let slot = match side {
            Side::Bid => &mut self.bid_market_order,
            Side::Ask => &mut self.ask_market_order,
        };
        slot.get_or_insert_with(|| PriceLevel::new(0, side))
    }

    pub fn market_order_level(&self, side: Side) -> Option<&PriceLevel> {
        match side {
            Side::Bid => self.bid_market_order.as_ref(),
            Side::Ask => self.ask_market_order.as_ref(),
        }
    }

    /// Discard all levels, market orders, and pending detachments.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.bid_market_order = None;
        self.ask_market_order = None;
        self.detached.clear();
        self.consistent = false;
        self.book_time = 0;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.values().next_back()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.values().next()
    }

    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    /// Bid levels from best (highest price) downward.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values().rev()
    }

    /// Ask levels from best (lowest price) upward.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    #[inline]
    pub fn set_consistent(&mut self, consistent: bool) {
        self.consistent = consistent;
    }

    #[inline]
    pub fn quality(&self) -> BookQuality {
        self.quality
    }

    #[inline]
    pub fn set_quality(&mut self, quality: BookQuality) {
        self.quality = quality;
    }

    #[inline]
    pub fn book_time(&self) -> u64 {
        self.book_time
    }

    #[inline]
    pub fn set_book_time(&mut self, time: u64) {
        self.book_time = time;
    }

    // ------------------------------------------------------------------
    // Entry operations (manager kept in lockstep, manager first)
    // ------------------------------------------------------------------

    /// Resolve an entry within a level, creating it on demand.
    ///
    /// When an entry manager is in use the manager index is updated *before*
    /// the level so a partial failure can never leave a dangling index entry.
    /// Returns the entry and whether it was newly created.
    pub fn find_or_create_entry<'a>(
        level: &'a mut PriceLevel,
        manager: Option<&mut EntryManager>,
        id: &str,
        time: u64,
    ) -> (&'a mut Entry, bool) {
        if level.find_entry(id).is_none() {
            if let Some(mgr) = manager {
                mgr.insert(id, level.side(), level.price());
            }
            let entry = level.push_entry(Entry::new(id, 0, time));
            (entry, true)
        } else {
            (level.find_entry_mut(id).expect("entry exists"), false)
        }
    }

    /// Remove an entry from its level and the manager index atomically.
    ///
    /// Returns `None` when the entry does not exist; unknown-id deletes are a
    /// caller-level no-op since feed replay can legitimately re-deliver them.
    pub fn delete_entry(
        level: &mut PriceLevel,
        manager: Option<&mut EntryManager>,
        id: &str,
    ) -> Option<Entry> {
        level.find_entry(id)?;
        if let Some(mgr) = manager {
            mgr.remove(id);
        }
        level.remove_entry(id)
    }
}

/// Global identifier → entry lookup index for one book.
///
/// A lookup-only association: the index stores the owning level's coordinates
/// (side, price), never the entry itself. Ownership of every entry remains
/// exclusively with its price level.
#[derive(Debug, Clone, Default)]
pub struct EntryManager {
    index: AHashMap<String, (Side, i64)>,
}

impl EntryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, side: Side, price: i64) {
        self.index.insert(id.to_owned(), (side, price));
    }

    pub fn remove(&mut self, id: &str) -> Option<(Side, i64)> {
        self.index.remove(id)
    }

    /// Locate the level coordinates owning an entry id.
    pub fn locate(&self, id: &str) -> Option<(Side, i64)> {
        self.index.get(id).copied()
    }

    /// Resolve an entry through the index instead of per-level linear search.
    pub fn resolve<'a>(&self, book: &'a OrderBook, id: &str) -> Option<&'a Entry> {
        let (side, price) = self.locate(id)?;
        book.find_level(price, side)?.find_entry(id)
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
