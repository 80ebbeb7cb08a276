//! Field extraction: one wire message → transient scratch values.
//!
//! The extractor iterates a message's fields exactly once, dispatching each
//! by resolved field id into a per-message scratch structure. Two wire shapes
//! are supported transparently:
//!
//! - **flat**: a single level (and optionally a single entry) embedded
//!   directly in the top-level fields;
//! - **nested**: a vector of level sub-messages, each optionally carrying a
//!   vector of entry sub-messages.
//!
//! Both shapes produce an identical [`MessageScratch`]. Scratch state is
//! fully reset per top-level message, and nested levels/entries each parse
//! into fresh scratch, so stale values never leak across iterations. A
//! dedicated region holds the bid/ask market-order side channel, which
//! bypasses normal price ordering.

use crate::fields::{EntryField, FieldIds, FieldValue, LevelField, TopField, WireMessage};
use crate::types::{EntryAction, EntryStatus, LevelAction, Side};

/// Transient per-entry field values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryScratch {
    pub id: Option<String>,
    pub size: Option<u64>,
    pub time: Option<u64>,
    pub action: Option<EntryAction>,
    pub reason: Option<u32>,
    pub status: Option<EntryStatus>,
}

impl EntryScratch {
    pub fn has_data(&self) -> bool {
        self.id.is_some()
            || self.size.is_some()
            || self.time.is_some()
            || self.action.is_some()
            || self.status.is_some()
    }
}

/// Transient per-level field values, including nested entries in document
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelScratch {
    pub price: Option<i64>,
    pub side: Option<Side>,
    pub action: Option<LevelAction>,
    pub size: Option<u64>,
    pub size_change: Option<i64>,
    pub time: Option<u64>,
    pub num_entries: Option<u32>,
    pub num_attach: Option<u32>,
    pub entries: Vec<EntryScratch>,
}

impl LevelScratch {
    pub fn has_data(&self) -> bool {
        self.price.is_some()
            || self.side.is_some()
            || self.action.is_some()
            || self.size.is_some()
            || !self.entries.is_empty()
    }
}

/// Transient per-message field values; reused across messages.
#[derive(Debug, Clone, Default)]
pub struct MessageScratch {
    pub seq_num: Option<u64>,
    pub part_num: Option<u32>,
    pub part_total: Option<u32>,
    pub symbol: Option<String>,
    pub part_id: Option<String>,
    pub src_time: Option<u64>,
    pub line_time: Option<u64>,
    pub send_time: Option<u64>,
    pub activity_time: Option<u64>,
    pub sender_id: Option<u64>,
    pub book_time: Option<u64>,
    pub num_levels: Option<u32>,
    /// Normal levels, flat or nested, in document order.
    pub levels: Vec<LevelScratch>,
    /// Market-order side channel, bid levels.
    pub bid_market_orders: Vec<LevelScratch>,
    /// Market-order side channel, ask levels.
    pub ask_market_orders: Vec<LevelScratch>,

    // Flat-shape staging; merged into `levels` once the pass completes.
    flat: LevelScratch,
    flat_entry: EntryScratch,
}

impl MessageScratch {
    fn reset(&mut self) {
        *self = MessageScratch {
            // reuse allocated vectors
            levels: std::mem::take(&mut self.levels),
            bid_market_orders: std::mem::take(&mut self.bid_market_orders),
            ask_market_orders: std::mem::take(&mut self.ask_market_orders),
            ..MessageScratch::default()
        };
        self.levels.clear();
        self.bid_market_orders.clear();
        self.ask_market_orders.clear();
    }

    /// True when the message carried only market-order updates.
    pub fn is_market_order_only(&self) -> bool {
        self.levels.is_empty()
            && (!self.bid_market_orders.is_empty() || !self.ask_market_orders.is_empty())
    }
}

/// Converts wire messages into [`MessageScratch`] using a resolved
/// [`FieldIds`] registry. One instance per listener; scratch storage is
/// reused across messages.
#[derive(Debug)]
pub struct FieldExtractor {
    ids: FieldIds,
    scratch: MessageScratch,
}

impl FieldExtractor {
    /// Build from an already-resolved registry (resolution happens once at
    /// startup, never lazily per message).
    pub fn new(ids: FieldIds) -> Self {
        Self {
            ids,
            scratch: MessageScratch::default(),
        }
    }

    pub fn ids(&self) -> &FieldIds {
        &self.ids
    }

    /// Parse one message in a single field-iteration pass.
    pub fn extract(&mut self, msg: &WireMessage) -> &MessageScratch {
        let Self { ids, scratch } = self;
        scratch.reset();

        msg.for_each_field(|field| {
            let Some(tag) = ids.top_field(field.fid) else {
                return; // unrecognized fid, not ours to interpret
            };
            match tag {
                TopField::SeqNum => scratch.seq_num = field.value.as_u64(),
                TopField::MsgNum => scratch.part_num = field.value.as_u32(),
                TopField::MsgTotal => scratch.part_total = field.value.as_u32(),
                TopField::Symbol => {
                    scratch.symbol = field.value.as_str().map(str::to_owned)
                }
                TopField::PartId => {
                    scratch.part_id = field.value.as_str().map(str::to_owned)
                }
                TopField::SrcTime => scratch.src_time = field.value.as_datetime(),
                TopField::LineTime => scratch.line_time = field.value.as_datetime(),
                TopField::SendTime => scratch.send_time = field.value.as_datetime(),
                TopField::ActivityTime => {
                    scratch.activity_time = field.value.as_datetime()
                }
                TopField::SenderId => scratch.sender_id = field.value.as_u64(),
                TopField::BookTime => scratch.book_time = field.value.as_datetime(),
                TopField::NumLevels => scratch.num_levels = field.value.as_u32(),
                TopField::PriceLevels => {
                    Self::parse_level_vector(ids, &field.value, &mut scratch.levels)
                }
                TopField::BidMarketOrders => Self::parse_level_vector(
                    ids,
                    &field.value,
                    &mut scratch.bid_market_orders,
                ),
                TopField::AskMarketOrders => Self::parse_level_vector(
                    ids,
                    &field.value,
                    &mut scratch.ask_market_orders,
                ),
                // Property markers are recognized but carry no book state.
                TopField::BookPropMsgType | TopField::BookPropFids => {}
                TopField::Level(tag) => {
                    Self::apply_level_field(ids, tag, &field.value, &mut scratch.flat)
                }
                TopField::Entry(tag) => {
                    Self::apply_entry_field(tag, &field.value, &mut scratch.flat_entry)
                }
            }
        });

        // Merge the flat shape: a flat entry belongs to the flat level, and a
        // flat level only stands in when no nested vector was present.
        if scratch.flat_entry.has_data() {
            let entry = std::mem::take(&mut scratch.flat_entry);
            scratch.flat.entries.push(entry);
        }
        if scratch.levels.is_empty() && scratch.flat.has_data() {
            scratch.levels.push(std::mem::take(&mut scratch.flat));
        } else {
            scratch.flat = LevelScratch::default();
        }

        scratch
    }

    fn parse_level_vector(ids: &FieldIds, value: &FieldValue, out: &mut Vec<LevelScratch>) {
        match value {
            FieldValue::Vector(items) => {
                for item in items {
                    if let Some(sub) = item.as_submsg() {
                        out.push(Self::parse_level(ids, sub));
                    }
                }
            }
            // single sub-message tolerated as a one-element vector
            FieldValue::SubMsg(sub) => out.push(Self::parse_level(ids, sub)),
            _ => log::warn!("level vector field has non-vector payload, ignoring"),
        }
    }

    fn parse_level(ids: &FieldIds, msg: &WireMessage) -> LevelScratch {
        let mut level = LevelScratch::default();
        msg.for_each_field(|field| {
            if let Some(tag) = ids.level_field(field.fid) {
                Self::apply_level_field(ids, tag, &field.value, &mut level);
            }
        });
        level
    }

    fn apply_level_field(
        ids: &FieldIds,
        tag: LevelField,
        value: &FieldValue,
        level: &mut LevelScratch,
    ) {
        match tag {
            LevelField::Price => level.price = value.as_price(),
            LevelField::Side => {
                level.side = value
                    .as_char()
                    .and_then(|c| Side::from_byte(c as u8).ok());
            }
            LevelField::Action => {
                level.action = value
                    .as_char()
                    .and_then(|c| LevelAction::from_byte(c as u8).ok());
            }
            LevelField::Size => level.size = value.as_u64(),
            LevelField::SizeChange => level.size_change = value.as_i64(),
            LevelField::Time => level.time = value.as_datetime(),
            LevelField::NumEntries => level.num_entries = value.as_u32(),
            LevelField::NumAttach => level.num_attach = value.as_u32(),
            LevelField::Entries => match value {
                FieldValue::Vector(items) => {
                    for item in items {
                        if let Some(sub) = item.as_submsg() {
                            level.entries.push(Self::parse_entry(ids, sub));
                        }
                    }
                }
                FieldValue::SubMsg(sub) => level.entries.push(Self::parse_entry(ids, sub)),
                _ => log::warn!("entry vector field has non-vector payload, ignoring"),
            },
            LevelField::PropMsgType | LevelField::PropFids => {}
        }
    }

    fn parse_entry(ids: &FieldIds, msg: &WireMessage) -> EntryScratch {
        let mut entry = EntryScratch::default();
        msg.for_each_field(|field| {
            if let Some(tag) = ids.entry_field(field.fid) {
                Self::apply_entry_field(tag, &field.value, &mut entry);
            }
        });
        entry
    }

    fn apply_entry_field(tag: EntryField, value: &FieldValue, entry: &mut EntryScratch) {
        match tag {
            EntryField::Id => entry.id = value.as_str().map(str::to_owned),
            EntryField::Size => entry.size = value.as_u64(),
            EntryField::Time => entry.time = value.as_datetime(),
            EntryField::Action => {
                entry.action = value
                    .as_char()
                    .and_then(|c| EntryAction::from_byte(c as u8).ok());
            }
            EntryField::Reason => entry.reason = value.as_u32(),
            EntryField::Status => {
                entry.status = value.as_u32().map(EntryStatus::from_wire)
            }
            EntryField::PropMsgType | EntryField::PropFids => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldDictionary, FieldValue, WireMessage};

    fn extractor() -> FieldExtractor {
        let dict = FieldDictionary::standard();
        FieldExtractor::new(FieldIds::resolve(&dict).unwrap())
    }

    fn entry_sub(ids: &FieldIds, id: &str, size: u64, action: u8) -> FieldValue {
        FieldValue::SubMsg(
            WireMessage::new()
                .with(ids.entry_id, FieldValue::Str(id.to_owned()))
                .with(ids.entry_size, FieldValue::U64(size))
                .with(ids.entry_action, FieldValue::Char(action as char))
                .with(ids.entry_time, FieldValue::DateTime(42)),
        )
    }

    fn level_sub(ids: &FieldIds, price: f64, side: u8, action: u8, entries: Vec<FieldValue>) -> FieldValue {
        let mut m = WireMessage::new()
            .with(ids.pl_price, FieldValue::Price(price))
            .with(ids.pl_side, FieldValue::Char(side as char))
            .with(ids.pl_action, FieldValue::Char(action as char));
        if !entries.is_empty() {
            m.push(ids.pl_entries, FieldValue::Vector(entries));
        }
        FieldValue::SubMsg(m)
    }

    #[test]
    fn test_nested_shape() {
        let mut ex = extractor();
        let ids = ex.ids().clone();
        let entries = vec![
            entry_sub(&ids, "A", 60, b'A'),
            entry_sub(&ids, "B", 40, b'A'),
        ];
        let msg = WireMessage::new()
            .with(ids.seq_num, FieldValue::U64(10))
            .with(ids.sender_id, FieldValue::U64(1))
            .with(ids.num_levels, FieldValue::U32(1))
            .with(
                ids.price_levels,
                FieldValue::Vector(vec![level_sub(&ids, 10.0, b'B', b'A', entries)]),
            );

        let scratch = ex.extract(&msg);
        assert_eq!(scratch.seq_num, Some(10));
        assert_eq!(scratch.levels.len(), 1);
        let level = &scratch.levels[0];
        assert_eq!(level.price, Some(10_000_000_000));
        assert_eq!(level.side, Some(Side::Bid));
        assert_eq!(level.action, Some(LevelAction::Add));
        assert_eq!(level.entries.len(), 2);
        assert_eq!(level.entries[0].id.as_deref(), Some("A"));
        assert_eq!(level.entries[1].id.as_deref(), Some("B"));
    }

    #[test]
    fn test_flat_shape_matches_nested() {
        let mut ex = extractor();
        let ids = ex.ids().clone();

        let flat = WireMessage::new()
            .with(ids.seq_num, FieldValue::U64(11))
            .with(ids.pl_price, FieldValue::Price(10.0))
            .with(ids.pl_side, FieldValue::Char('B'))
            .with(ids.pl_action, FieldValue::Char('A'))
            .with(ids.entry_id, FieldValue::Str("A".into()))
            .with(ids.entry_size, FieldValue::U64(60))
            .with(ids.entry_action, FieldValue::Char('A'));
        let flat_levels = ex.extract(&flat).levels.clone();

        let nested = WireMessage::new()
            .with(ids.seq_num, FieldValue::U64(11))
            .with(
                ids.price_levels,
                FieldValue::Vector(vec![level_sub(
                    &ids,
                    10.0,
                    b'B',
                    b'A',
                    vec![entry_sub(&ids, "A", 60, b'A')],
                )]),
            );
        let nested_levels = ex.extract(&nested).levels.clone();

        assert_eq!(flat_levels.len(), 1);
        assert_eq!(nested_levels.len(), 1);
        assert_eq!(flat_levels[0].price, nested_levels[0].price);
        assert_eq!(flat_levels[0].side, nested_levels[0].side);
        assert_eq!(flat_levels[0].action, nested_levels[0].action);
        assert_eq!(flat_levels[0].entries[0].id, nested_levels[0].entries[0].id);
        assert_eq!(
            flat_levels[0].entries[0].size,
            nested_levels[0].entries[0].size
        );
    }

    #[test]
    fn test_side_accepts_one_char_string() {
        let mut ex = extractor();
        let ids = ex.ids().clone();
        let msg = WireMessage::new()
            .with(ids.pl_price, FieldValue::Price(10.0))
            .with(ids.pl_side, FieldValue::Str("A".into()));
        let scratch = ex.extract(&msg);
        assert_eq!(scratch.levels[0].side, Some(Side::Ask));
    }

    #[test]
    fn test_scratch_resets_between_messages() {
        let mut ex = extractor();
        let ids = ex.ids().clone();
        let first = WireMessage::new()
            .with(ids.seq_num, FieldValue::U64(1))
            .with(ids.pl_price, FieldValue::Price(10.0))
            .with(ids.pl_side, FieldValue::Char('B'));
        ex.extract(&first);

        let second = WireMessage::new().with(ids.seq_num, FieldValue::U64(2));
        let scratch = ex.extract(&second);
        assert_eq!(scratch.seq_num, Some(2));
        assert!(scratch.levels.is_empty());
        assert!(scratch.symbol.is_none());
    }

    #[test]
    fn test_market_order_channel() {
        let mut ex = extractor();
        let ids = ex.ids().clone();
        let msg = WireMessage::new()
            .with(ids.num_levels, FieldValue::U32(2))
            .with(
                ids.bid_market_orders,
                FieldValue::Vector(vec![level_sub(&ids, 0.0, b'B', b'U', vec![])]),
            );
        let scratch = ex.extract(&msg);
        assert!(scratch.levels.is_empty());
        assert_eq!(scratch.bid_market_orders.len(), 1);
        // market-order-only precedence: declared level count is not consulted
        assert!(scratch.is_market_order_only());
    }
}
