//! Order-book repository: price levels, entries, and the optional global
//! entry index.

mod level;
mod repository;

pub use level::{Entry, PriceLevel};
pub use repository::{EntryManager, OrderBook};
