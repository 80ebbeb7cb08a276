//! Cross-thread sharing of one listener.
//!
//! The listener itself is single-owner; concurrent access goes through this
//! wrapper instead. Message processing takes the write lock, readers take
//! point-in-time snapshots (or run a short closure) under the read lock.
//! Handlers never need the lock re-entrantly because reentrant mutations go
//! through the deferred command queue (see [`crate::listener::DispatchCtx`]).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::book::OrderBook;
use crate::conflation::{TimerDriver, TimerId};
use crate::error::Result;
use crate::fields::{FieldDictionary, WireMessage};
use crate::listener::{BookListener, ListenerState, ListenerStats, ProcessOutcome};
use crate::types::{BookQuality, MessageType};

/// Clonable handle to a listener shared across threads.
#[derive(Clone)]
pub struct SharedListener {
    inner: Arc<RwLock<BookListener>>,
}

impl SharedListener {
    pub fn new(listener: BookListener) -> Self {
        Self {
            inner: Arc::new(RwLock::new(listener)),
        }
    }

    pub fn configure_dictionary(&self, dict: &FieldDictionary) -> Result<()> {
        self.inner.write().configure_dictionary(dict)
    }

    pub fn process_message(
        &self,
        msg_type: MessageType,
        msg: &WireMessage,
        timer: &mut dyn TimerDriver,
    ) -> Result<ProcessOutcome> {
        self.inner.write().process_message(msg_type, msg, timer)
    }

    pub fn on_conflation_timer(&self, id: TimerId, timer: &mut dyn TimerDriver) {
        self.inner.write().on_conflation_timer(id, timer);
    }

    pub fn flush(&self, timer: &mut dyn TimerDriver) {
        self.inner.write().flush(timer);
    }

    pub fn set_quality(&self, quality: BookQuality, timer: &mut dyn TimerDriver) {
        self.inner.write().set_quality(quality, timer);
    }

    /// Point-in-time copy of the book, decoupled from further processing.
    pub fn snapshot(&self) -> OrderBook {
        self.inner.read().book().clone()
    }

    /// Run a short read-only closure against the live book without copying.
    ///
    /// The read lock is held for the duration; keep the closure cheap.
    pub fn with_book<R>(&self, f: impl FnOnce(&OrderBook) -> R) -> R {
        f(self.inner.read().book())
    }

    pub fn state(&self) -> ListenerState {
        self.inner.read().state()
    }

    pub fn stats(&self) -> ListenerStats {
        self.inner.read().stats().clone()
    }
}
