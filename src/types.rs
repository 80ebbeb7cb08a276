//! Core value types for book updates and deltas.
//!
//! These types are designed to be:
//! - Memory efficient (fixed-size where possible)
//! - Serializable for export/debugging
//! - Compatible with byte-encoded feed actions and sides

use serde::{Deserialize, Serialize};

use crate::error::{BookError, Result};

/// Fixed-point price scale: 1e9 units per whole price unit.
///
/// All prices in the book are normalized to this precision so that levels
/// keyed by price compare exactly regardless of the wire representation.
pub const PRICE_SCALE: i64 = 1_000_000_000;

/// Normalize a floating-point price to fixed-point book precision.
#[inline]
pub fn normalize_price(px: f64) -> i64 {
    (px * PRICE_SCALE as f64).round() as i64
}

/// Convert a fixed-point price back to floating point.
#[inline]
pub fn price_to_f64(px: i64) -> f64 {
    px as f64 / PRICE_SCALE as f64
}

/// Book side (bid or ask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy side
    Bid = b'B',
    /// Sell side
    Ask = b'A',
}

impl Side {
    /// Parse side from a byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'B' => Ok(Side::Bid),
            b'A' => Ok(Side::Ask),
            _ => Err(BookError::InvalidSide(byte)),
        }
    }

    /// Convert to byte representation.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    #[inline(always)]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    #[inline(always)]
    pub fn is_ask(self) -> bool {
        matches!(self, Side::Ask)
    }
}

/// Action applied to a price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LevelAction {
    /// Level newly added to the book
    Add = b'A',
    /// Existing level updated in place
    Update = b'U',
    /// Level removed from the book
    Delete = b'D',
    /// No structural change (size/time only)
    Unknown = b'Z',
}

impl LevelAction {
    /// Parse action from a byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'A' => Ok(LevelAction::Add),
            b'U' => Ok(LevelAction::Update),
            b'D' => Ok(LevelAction::Delete),
            b'Z' => Ok(LevelAction::Unknown),
            _ => Err(BookError::InvalidAction(byte)),
        }
    }

    /// Convert to byte representation.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Action applied to an individual entry within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryAction {
    /// Entry newly added to its level
    Add = b'A',
    /// Existing entry updated (size/time)
    Update = b'U',
    /// Entry removed from its level
    Delete = b'D',
}

impl EntryAction {
    /// Parse action from a byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'A' => Ok(EntryAction::Add),
            b'U' => Ok(EntryAction::Update),
            b'D' => Ok(EntryAction::Delete),
            _ => Err(BookError::InvalidAction(byte)),
        }
    }

    /// Convert to byte representation.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Status of an individual entry as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// Normal, active entry
    #[default]
    Active = 0,
    /// Entry is halted/suspended by the venue
    Halted = 1,
    /// Entry is closing
    Closing = 2,
}

impl EntryStatus {
    /// Parse status from its numeric wire value, defaulting to active.
    pub fn from_wire(value: u32) -> Self {
        match value {
            1 => EntryStatus::Halted,
            2 => EntryStatus::Closing,
            _ => EntryStatus::Active,
        }
    }
}

/// Data-quality state attached to a book.
///
/// Degrading transitions away from [`BookQuality::Ok`] may clear the book
/// (configurable on the listener) since stale levels are worse than none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BookQuality {
    /// No quality information received yet
    #[default]
    Unknown,
    /// Feed is healthy
    Ok,
    /// Feed is known stale; book content is suspect
    Stale,
}

/// Message type discriminators consumed from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Discard all book state
    Clear,
    /// Incremental update
    Update,
    /// Initial value (full state on subscription)
    Initial,
    /// Full-state replacement after a gap
    Recap,
    /// Full-state snapshot
    Snapshot,
}

impl MessageType {
    /// True for message types that fully replace book content.
    #[inline]
    pub fn is_full_state(self) -> bool {
        matches!(
            self,
            MessageType::Initial | MessageType::Recap | MessageType::Snapshot
        )
    }
}

/// A detected discontinuity in the sequence-number stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapInfo {
    /// First missing sequence number
    pub begin: u64,
    /// Last missing sequence number
    pub end: u64,
}

impl GapInfo {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Number of sequence numbers covered by the gap.
    pub fn width(&self) -> u64 {
        self.end.saturating_sub(self.begin).saturating_add(1)
    }
}
