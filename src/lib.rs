//! # orderbook-delta-engine
//!
//! Incremental order-book reconstruction and delta reporting for market-data
//! feed middleware.
//!
//! This library maintains full-depth order books (price levels, optionally
//! individual entries) from a stream of typed messages — snapshots, recaps,
//! incremental updates, clears — and reports each applied change to consumers
//! as the minimal delta that describes it.
//!
//! ## Features
//!
//! - **📖 Full-Depth Books**: Price-ordered levels per side with per-entry
//!   detail and a market-order side channel
//! - **🔺 Delta Reporting**: One elementary change dispatches as a simple
//!   delta, several as an ordered complex delta
//! - **🔍 Gap Detection**: Sequence-number continuity tracking with sender
//!   failover awareness and duplicate suppression
//! - **⏱ Conflation**: Optional time-window batching of update notifications
//!   behind a single one-shot timer
//! - **🗂 Entry Index**: Optional global id → entry lookup kept in lockstep
//!   with the book
//! - **🧵 Sharing**: `SharedListener` for cross-thread access with
//!   point-in-time snapshots
//!
//! ## Quick Start
//!
//! ```rust
//! use orderbook_delta_engine::{
//!     BookListener, FieldDictionary, FieldIds, FieldValue, ListenerConfig, ManualTimer,
//!     MessageType, WireMessage,
//! };
//!
//! let dict = FieldDictionary::standard();
//! let ids = FieldIds::resolve(&dict).unwrap();
//!
//! let mut listener = BookListener::new("ACME", ListenerConfig::default());
//! listener.configure_dictionary(&dict).unwrap();
//!
//! // A one-level snapshot: bid 500 @ $10.00
//! let snapshot = WireMessage::new()
//!     .with(ids.seq_num, FieldValue::U64(1))
//!     .with(
//!         ids.price_levels,
//!         FieldValue::SubMsg(
//!             WireMessage::new()
//!                 .with(ids.pl_price, FieldValue::Price(10.0))
//!                 .with(ids.pl_side, FieldValue::Char('B'))
//!                 .with(ids.pl_size, FieldValue::U64(500)),
//!         ),
//!     );
//!
//! let mut timer = ManualTimer::new();
//! listener
//!     .process_message(MessageType::Snapshot, &snapshot, &mut timer)
//!     .unwrap();
//!
//! let best = listener.book().best_bid().unwrap();
//! assert_eq!(best.size(), 500);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Core types: `Side`, `LevelAction`, `EntryAction`, `MessageType`, `GapInfo` |
//! | [`fields`] | Wire messages, the field dictionary, and resolved field ids |
//! | [`book`] | Book state: `OrderBook`, `PriceLevel`, `Entry`, `EntryManager` |
//! | [`extract`] | Single-pass field extraction into per-message scratch |
//! | [`delta`] | `SimpleDelta`/`ComplexDelta` accumulation and promotion |
//! | [`gap`] | Sequence continuity: `GapDetector`, `SeqCheck` |
//! | [`conflation`] | Time-window batching: `ConflationController`, `TimerDriver` |
//! | [`listener`] | Orchestration: `BookListener`, `BookEventHandler`, `DispatchCtx` |
//! | [`shared`] | Cross-thread handle: `SharedListener` |

pub mod book;
pub mod conflation;
pub mod delta;
pub mod error;
pub mod extract;
pub mod fields;
pub mod gap;
pub mod listener;
pub mod shared;
pub mod types;

// Re-exports - Core types
pub use error::{BookError, Result};
pub use types::{
    normalize_price, price_to_f64, BookQuality, EntryAction, EntryStatus, GapInfo, LevelAction,
    MessageType, Side, PRICE_SCALE,
};

// Re-exports - Wire layer
pub use fields::{FieldDictionary, FieldIds, FieldValue, WireField, WireMessage};

// Re-exports - Book state
pub use book::{Entry, EntryManager, OrderBook, PriceLevel};

// Re-exports - Deltas
pub use delta::{ComplexDelta, DeltaAccumulator, DeltaView, SimpleDelta};

// Re-exports - Continuity and conflation
pub use conflation::{ConflationConfig, ConflationController, ManualTimer, TimerDriver, TimerId};
pub use gap::{GapDetector, SeqCheck};

// Re-exports - Orchestration
pub use extract::{FieldExtractor, MessageScratch};
pub use listener::{
    BookEventHandler, BookListener, DispatchCtx, ListenerConfig, ListenerState, ListenerStats,
    ProcessOutcome,
};
pub use shared::SharedListener;
