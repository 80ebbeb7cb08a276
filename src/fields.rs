//! Wire field contract and field-identifier registry.
//!
//! The payload codec lives outside this engine: by the time a message reaches
//! the listener it is an already-typed, single-pass iterable field sequence.
//! This module defines that contract ([`WireMessage`] / [`WireField`] /
//! [`FieldValue`]) plus the [`FieldDictionary`] resolution that maps symbolic
//! field names to the numeric identifiers the engine dispatches on.
//!
//! # Dispatch design
//!
//! Field identifiers are resolved exactly once from an externally supplied
//! dictionary into an immutable [`FieldIds`] registry. The registry also
//! carries three prebuilt id → tag dispatch tables (top-level, price-level,
//! entry) so per-field dispatch is an O(1) hash probe on a tagged enum, not a
//! lazily initialized function-pointer table.

use ahash::AHashMap;

use crate::error::{BookError, Result};
use crate::types::normalize_price;

// ============================================================================
// Field values
// ============================================================================

/// One typed field value as delivered by the transport codec.
///
/// Accessors return `None` when the stored representation cannot serve the
/// requested type. Numeric accessors are lenient across integer widths since
/// producers disagree about them; `as_char` additionally accepts a
/// one-character string, a legal encoding on some feeds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Char(char),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Nanoseconds since epoch
    DateTime(u64),
    /// Price in its wire (floating point) representation
    Price(f64),
    SubMsg(WireMessage),
    Vector(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            FieldValue::U8(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Character accessor with string coercion: a declared-char field may
    /// legally arrive encoded as a one-character string.
    pub fn as_char(&self) -> Option<char> {
        match self {
            FieldValue::Char(c) => Some(*c),
            FieldValue::U8(b) => Some(*b as char),
            FieldValue::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::U8(v) => Some(*v as u64),
            FieldValue::U16(v) => Some(*v as u64),
            FieldValue::U32(v) => Some(*v as u64),
            FieldValue::U64(v) => Some(*v),
            FieldValue::I8(v) => u64::try_from(*v).ok(),
            FieldValue::I16(v) => u64::try_from(*v).ok(),
            FieldValue::I32(v) => u64::try_from(*v).ok(),
            FieldValue::I64(v) => u64::try_from(*v).ok(),
            FieldValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::I8(v) => Some(*v as i64),
            FieldValue::I16(v) => Some(*v as i64),
            FieldValue::I32(v) => Some(*v as i64),
            FieldValue::I64(v) => Some(*v),
            FieldValue::U8(v) => Some(*v as i64),
            FieldValue::U16(v) => Some(*v as i64),
            FieldValue::U32(v) => Some(*v as i64),
            FieldValue::U64(v) => i64::try_from(*v).ok(),
            FieldValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::F32(v) => Some(*v as f64),
            FieldValue::F64(v) => Some(*v),
            FieldValue::Price(v) => Some(*v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Nanoseconds since epoch.
    pub fn as_datetime(&self) -> Option<u64> {
        match self {
            FieldValue::DateTime(t) => Some(*t),
            _ => self.as_u64(),
        }
    }

    /// Price normalized to fixed-point book precision.
    pub fn as_price(&self) -> Option<i64> {
        self.as_f64().map(normalize_price)
    }

    pub fn as_submsg(&self) -> Option<&WireMessage> {
        match self {
            FieldValue::SubMsg(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Vector(v) => Some(v),
            _ => None,
        }
    }
}

/// One field: numeric identifier plus typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct WireField {
    pub fid: u32,
    pub value: FieldValue,
}

/// An already-decoded inbound message: an ordered field sequence supporting
/// exactly one iteration pass per consumer, in document order.
///
/// Field order at the top level is not meaningful; nested sub-message vectors
/// preserve document order, which the extractor relies on for entry ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMessage {
    fields: Vec<WireField>,
}

impl WireMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field append (used heavily by tests and mock feeds).
    pub fn with(mut self, fid: u32, value: FieldValue) -> Self {
        self.fields.push(WireField { fid, value });
        self
    }

    pub fn push(&mut self, fid: u32, value: FieldValue) {
        self.fields.push(WireField { fid, value });
    }

    /// Single-pass iteration over every field in document order.
    pub fn for_each_field<F: FnMut(&WireField)>(&self, mut f: F) {
        for field in &self.fields {
            f(field);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Field dictionary
// ============================================================================

/// Externally supplied mapping from symbolic field names to numeric ids.
///
/// The engine never hardcodes fids; deployments remap names freely.
#[derive(Debug, Clone, Default)]
pub struct FieldDictionary {
    by_name: AHashMap<String, u32>,
}

impl FieldDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            by_name: pairs.into_iter().map(|(n, f)| (n.into(), f)).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, fid: u32) {
        self.by_name.insert(name.into(), fid);
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// A dictionary carrying the full standard field set with contiguous ids.
    /// Intended for tests and mock feeds.
    pub fn standard() -> Self {
        Self::from_pairs(
            FIELD_NAMES
                .iter()
                .enumerate()
                .map(|(i, &name)| (name, (i + 1) as u32)),
        )
    }
}

/// Canonical names for every field this engine consumes, in registry order.
const FIELD_NAMES: &[&str] = &[
    "wSeqNum",
    "wMsgNum",
    "wMsgTotal",
    "wSymbol",
    "wPartId",
    "wSrcTime",
    "wLineTime",
    "wSendTime",
    "wActivityTime",
    "wSenderId",
    "wBookTime",
    "wNumLevels",
    "wPriceLevels",
    "wPlPrice",
    "wPlSide",
    "wPlAction",
    "wPlSize",
    "wPlSizeChange",
    "wPlTime",
    "wPlNumEntries",
    "wPlNumAttach",
    "wPlEntries",
    "wEntryId",
    "wEntrySize",
    "wEntryTime",
    "wEntryAction",
    "wEntryReason",
    "wEntryStatus",
    "wBookPropMsgType",
    "wBookPropFids",
    "wPlPropMsgType",
    "wPlPropFids",
    "wEntryPropMsgType",
    "wEntryPropFids",
    "wBidMarketOrders",
    "wAskMarketOrders",
];

// ============================================================================
// Dispatch tags
// ============================================================================

/// Tag for a field recognized at the top level of a message.
///
/// Flat-shape messages embed a single level (and optionally a single entry)
/// directly in the top-level fields, so level and entry tags appear here too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopField {
    SeqNum,
    MsgNum,
    MsgTotal,
    Symbol,
    PartId,
    SrcTime,
    LineTime,
    SendTime,
    ActivityTime,
    SenderId,
    BookTime,
    NumLevels,
    PriceLevels,
    BidMarketOrders,
    AskMarketOrders,
    BookPropMsgType,
    BookPropFids,
    Level(LevelField),
    Entry(EntryField),
}

/// Tag for a field recognized inside a price-level sub-message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelField {
    Price,
    Side,
    Action,
    Size,
    SizeChange,
    Time,
    NumEntries,
    NumAttach,
    Entries,
    PropMsgType,
    PropFids,
}

/// Tag for a field recognized inside an entry sub-message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Id,
    Size,
    Time,
    Action,
    Reason,
    Status,
    PropMsgType,
    PropFids,
}

// ============================================================================
// Resolved registry
// ============================================================================

/// Immutable registry of resolved field ids and dispatch tables.
///
/// Built once during startup from the supplied [`FieldDictionary`]; the
/// listener refuses to process messages until this exists. Resolution failure
/// names the missing field so misconfigured deployments are diagnosable.
#[derive(Debug, Clone)]
pub struct FieldIds {
    pub seq_num: u32,
    pub msg_num: u32,
    pub msg_total: u32,
    pub symbol: u32,
    pub part_id: u32,
    pub src_time: u32,
    pub line_time: u32,
    pub send_time: u32,
    pub activity_time: u32,
    pub sender_id: u32,
    pub book_time: u32,
    pub num_levels: u32,
    pub price_levels: u32,
    pub pl_price: u32,
    pub pl_side: u32,
    pub pl_action: u32,
    pub pl_size: u32,
    pub pl_size_change: u32,
    pub pl_time: u32,
    pub pl_num_entries: u32,
    pub pl_num_attach: u32,
    pub pl_entries: u32,
    pub entry_id: u32,
    pub entry_size: u32,
    pub entry_time: u32,
    pub entry_action: u32,
    pub entry_reason: u32,
    pub entry_status: u32,
    pub book_prop_msg_type: u32,
    pub book_prop_fids: u32,
    pub pl_prop_msg_type: u32,
    pub pl_prop_fids: u32,
    pub entry_prop_msg_type: u32,
    pub entry_prop_fids: u32,
    pub bid_market_orders: u32,
    pub ask_market_orders: u32,

    top_dispatch: AHashMap<u32, TopField>,
    level_dispatch: AHashMap<u32, LevelField>,
    entry_dispatch: AHashMap<u32, EntryField>,
}

impl FieldIds {
    /// Resolve every required field name against the dictionary.
    pub fn resolve(dict: &FieldDictionary) -> Result<Self> {
        fn req(dict: &FieldDictionary, name: &'static str) -> Result<u32> {
            dict.id(name).ok_or(BookError::UnresolvedField(name))
        }

        let mut ids = Self {
            seq_num: req(dict, "wSeqNum")?,
            msg_num: req(dict, "wMsgNum")?,
            msg_total: req(dict, "wMsgTotal")?,
            symbol: req(dict, "wSymbol")?,
            part_id: req(dict, "wPartId")?,
            src_time: req(dict, "wSrcTime")?,
            line_time: req(dict, "wLineTime")?,
            send_time: req(dict, "wSendTime")?,
            activity_time: req(dict, "wActivityTime")?,
            sender_id: req(dict, "wSenderId")?,
            book_time: req(dict, "wBookTime")?,
            num_levels: req(dict, "wNumLevels")?,
            price_levels: req(dict, "wPriceLevels")?,
            pl_price: req(dict, "wPlPrice")?,
            pl_side: req(dict, "wPlSide")?,
            pl_action: req(dict, "wPlAction")?,
            pl_size: req(dict, "wPlSize")?,
            pl_size_change: req(dict, "wPlSizeChange")?,
            pl_time: req(dict, "wPlTime")?,
            pl_num_entries: req(dict, "wPlNumEntries")?,
            pl_num_attach: req(dict, "wPlNumAttach")?,
            pl_entries: req(dict, "wPlEntries")?,
            entry_id: req(dict, "wEntryId")?,
            entry_size: req(dict, "wEntrySize")?,
            entry_time: req(dict, "wEntryTime")?,
            entry_action: req(dict, "wEntryAction")?,
            entry_reason: req(dict, "wEntryReason")?,
            entry_status: req(dict, "wEntryStatus")?,
            book_prop_msg_type: req(dict, "wBookPropMsgType")?,
            book_prop_fids: req(dict, "wBookPropFids")?,
            pl_prop_msg_type: req(dict, "wPlPropMsgType")?,
            pl_prop_fids: req(dict, "wPlPropFids")?,
            entry_prop_msg_type: req(dict, "wEntryPropMsgType")?,
            entry_prop_fids: req(dict, "wEntryPropFids")?,
            bid_market_orders: req(dict, "wBidMarketOrders")?,
            ask_market_orders: req(dict, "wAskMarketOrders")?,
            top_dispatch: AHashMap::new(),
            level_dispatch: AHashMap::new(),
            entry_dispatch: AHashMap::new(),
        };
        ids.build_dispatch();
        Ok(ids)
    }

    fn build_dispatch(&mut self) {
        let level_pairs = [
            (self.pl_price, LevelField::Price),
            (self.pl_side, LevelField::Side),
            (self.pl_action, LevelField::Action),
            (self.pl_size, LevelField::Size),
            (self.pl_size_change, LevelField::SizeChange),
            (self.pl_time, LevelField::Time),
            (self.pl_num_entries, LevelField::NumEntries),
            (self.pl_num_attach, LevelField::NumAttach),
            (self.pl_entries, LevelField::Entries),
            (self.pl_prop_msg_type, LevelField::PropMsgType),
            (self.pl_prop_fids, LevelField::PropFids),
        ];
        let entry_pairs = [
            (self.entry_id, EntryField::Id),
            (self.entry_size, EntryField::Size),
            (self.entry_time, EntryField::Time),
            (self.entry_action, EntryField::Action),
            (self.entry_reason, EntryField::Reason),
            (self.entry_status, EntryField::Status),
            (self.entry_prop_msg_type, EntryField::PropMsgType),
            (self.entry_prop_fids, EntryField::PropFids),
        ];

        self.level_dispatch = level_pairs.iter().copied().collect();
        self.entry_dispatch = entry_pairs.iter().copied().collect();

        let mut top: AHashMap<u32, TopField> = [
            (self.seq_num, TopField::SeqNum),
            (self.msg_num, TopField::MsgNum),
            (self.msg_total, TopField::MsgTotal),
            (self.symbol, TopField::Symbol),
            (self.part_id, TopField::PartId),
            (self.src_time, TopField::SrcTime),
            (self.line_time, TopField::LineTime),
            (self.send_time, TopField::SendTime),
            (self.activity_time, TopField::ActivityTime),
            (self.sender_id, TopField::SenderId),
            (self.book_time, TopField::BookTime),
            (self.num_levels, TopField::NumLevels),
            (self.price_levels, TopField::PriceLevels),
            (self.bid_market_orders, TopField::BidMarketOrders),
            (self.ask_market_orders, TopField::AskMarketOrders),
            (self.book_prop_msg_type, TopField::BookPropMsgType),
            (self.book_prop_fids, TopField::BookPropFids),
        ]
        .into_iter()
        .collect();

        // Flat-shape messages carry level/entry fields at the top level.
        for (fid, tag) in level_pairs {
            top.insert(fid, TopField::Level(tag));
        }
        for (fid, tag) in entry_pairs {
            top.insert(fid, TopField::Entry(tag));
        }
        self.top_dispatch = top;
    }

    #[inline]
    pub fn top_field(&self, fid: u32) -> Option<TopField> {
        self.top_dispatch.get(&fid).copied()
    }

    #[inline]
    pub fn level_field(&self, fid: u32) -> Option<LevelField> {
        self.level_dispatch.get(&fid).copied()
    }

    #[inline]
    pub fn entry_field(&self, fid: u32) -> Option<EntryField> {
        self.entry_dispatch.get(&fid).copied()
    }
}
