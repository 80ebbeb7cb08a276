//! Delta accumulation: elementary changes, simple/complex promotion.
//!
//! One inbound message produces zero or more elementary level/entry changes.
//! The accumulator's change counter decides the notification shape:
//! 0 = nothing to report, 1 = the stored [`SimpleDelta`] is authoritative,
//! >= 2 = a [`ComplexDelta`] built lazily by promoting the first simple delta.
//!
//! Storage is reused across dispatch cycles; `clear` resets the counter
//! without freeing the underlying vector.

use serde::{Deserialize, Serialize};

use crate::types::{EntryAction, LevelAction, Side};

/// Exactly one elementary change: which entry (if any), which level, how the
/// size moved, and what happened structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleDelta {
    /// Entry affected, `None` for level-only changes
    pub entry_id: Option<String>,
    /// Owning level's normalized price
    pub price: i64,
    pub side: Side,
    /// Signed size movement attributable to this change
    pub size_change: i64,
    pub level_action: LevelAction,
    /// `None` for level-only changes
    pub entry_action: Option<EntryAction>,
}

/// An ordered sequence of elementary changes from one or more messages.
///
/// Ordering is arrival order: level iteration order, entry iteration order
/// within each level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexDelta {
    changes: Vec<SimpleDelta>,
}

impl ComplexDelta {
    pub fn changes(&self) -> &[SimpleDelta] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimpleDelta> {
        self.changes.iter()
    }
}

/// Borrowed view of the current accumulation state.
#[derive(Debug, Clone, Copy)]
pub enum DeltaView<'a> {
    None,
    Simple(&'a SimpleDelta),
    Complex(&'a ComplexDelta),
}

/// Accumulates elementary changes for the current dispatch cycle.
///
/// Two independent instances exist per listener: one for normal levels and
/// one for the market-order side channel, which is dispatched separately.
#[derive(Debug, Clone, Default)]
pub struct DeltaAccumulator {
    count: u32,
    simple: Option<SimpleDelta>,
    complex: ComplexDelta,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one elementary change.
    ///
    /// The first call stores a simple delta; the second promotes it into the
    /// complex sequence; later calls append in arrival order.
    pub fn add(&mut self, delta: SimpleDelta) {
        self.count = self.count.saturating_add(1);
        match self.count {
            1 => self.simple = Some(delta),
            _ => {
                if let Some(first) = self.simple.take() {
                    self.complex.changes.push(first);
                }
                self.complex.changes.push(delta);
            }
        }
    }

    /// Elementary-change counter for the current cycle.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn has_changes(&self) -> bool {
        self.count > 0
    }

    /// Current accumulation as a borrow; shape follows the counter.
    pub fn view(&self) -> DeltaView<'_> {
        match self.count {
            0 => DeltaView::None,
            1 => match &self.simple {
                Some(s) => DeltaView::Simple(s),
                None => DeltaView::None,
            },
            _ => DeltaView::Complex(&self.complex),
        }
    }

    /// Reset the counter; retains storage for reuse across cycles.
    pub fn clear(&mut self) {
        self.count = 0;
        self.simple = None;
        self.complex.changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(id: &str, size_change: i64) -> SimpleDelta {
        SimpleDelta {
            entry_id: Some(id.to_owned()),
            price: 10_000_000_000,
            side: Side::Bid,
            size_change,
            level_action: LevelAction::Update,
            entry_action: Some(EntryAction::Update),
        }
    }

    #[test]
    fn test_empty_view() {
        let acc = DeltaAccumulator::new();
        assert_eq!(acc.count(), 0);
        assert!(matches!(acc.view(), DeltaView::None));
    }

    #[test]
    fn test_single_change_is_simple() {
        let mut acc = DeltaAccumulator::new();
        acc.add(delta("A", 10));
        assert_eq!(acc.count(), 1);
        match acc.view() {
            DeltaView::Simple(s) => {
                assert_eq!(s.entry_id.as_deref(), Some("A"));
                assert_eq!(s.size_change, 10);
            }
            other => panic!("expected simple delta, got {other:?}"),
        }
    }

    #[test]
    fn test_second_change_promotes_to_complex() {
        let mut acc = DeltaAccumulator::new();
        acc.add(delta("A", 10));
        acc.add(delta("B", -5));
        assert_eq!(acc.count(), 2);
        match acc.view() {
            DeltaView::Complex(c) => {
                assert_eq!(c.len(), 2);
                // promotion preserves arrival order
                assert_eq!(c.changes()[0].entry_id.as_deref(), Some("A"));
                assert_eq!(c.changes()[1].entry_id.as_deref(), Some("B"));
            }
            other => panic!("expected complex delta, got {other:?}"),
        }
    }

    #[test]
    fn test_appends_in_arrival_order() {
        let mut acc = DeltaAccumulator::new();
        for (i, id) in ["A", "B", "C", "D"].iter().enumerate() {
            acc.add(delta(id, i as i64));
        }
        match acc.view() {
            DeltaView::Complex(c) => {
                let ids: Vec<&str> = c
                    .iter()
                    .map(|d| d.entry_id.as_deref().unwrap_or(""))
                    .collect();
                assert_eq!(ids, vec!["A", "B", "C", "D"]);
            }
            other => panic!("expected complex delta, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_delta_serializes() {
        let json = serde_json::to_value(delta("A", -5)).unwrap();
        assert_eq!(json["entry_id"], "A");
        assert_eq!(json["size_change"], -5);
        assert_eq!(json["side"], "Bid");
    }

    #[test]
    fn test_clear_resets_counter_and_reuses_storage() {
        let mut acc = DeltaAccumulator::new();
        acc.add(delta("A", 1));
        acc.add(delta("B", 2));
        acc.clear();
        assert_eq!(acc.count(), 0);
        assert!(matches!(acc.view(), DeltaView::None));

        acc.add(delta("C", 3));
        match acc.view() {
            DeltaView::Simple(s) => assert_eq!(s.entry_id.as_deref(), Some("C")),
            other => panic!("expected simple delta, got {other:?}"),
        }
    }
}
