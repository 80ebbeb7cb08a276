//! Time-window conflation of accumulated deltas.
//!
//! The controller batches bursts of updates behind a single one-shot timer:
//! while a timer is pending, newly accumulated changes simply wait for it.
//! The timer primitive itself is an external collaborator behind the
//! [`TimerDriver`] seam; it fires exactly once on the owning dispatch context
//! and is cancellable before it fires. Pending timers must be cancelled on
//! forced flush and on listener teardown so no callback fires against a
//! listener that already moved on.

use std::time::Duration;

/// Handle for one scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// External one-shot timer collaborator.
///
/// Implementations fire the listener's timer callback exactly once on the
/// owning dispatch context. The handle is implicitly consumed by firing.
pub trait TimerDriver {
    fn schedule(&mut self, interval: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Conflation behavior for one listener.
#[derive(Debug, Clone)]
pub struct ConflationConfig {
    pub enabled: bool,
    /// Batching window for deferred notifications.
    pub interval: Duration,
}

impl Default for ConflationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_millis(500),
        }
    }
}

/// Whether the just-built delta should go out now or wait for the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    Immediate,
    Deferred,
}

/// Ensures at most one pending notification timer exists per listener.
#[derive(Debug, Default)]
pub struct ConflationController {
    config: ConflationConfig,
    pending: Option<TimerId>,
}

impl ConflationController {
    pub fn new(config: ConflationConfig) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Decide routing for newly accumulated changes.
    ///
    /// Immediate requests (and disabled conflation) dispatch now, cancelling
    /// any outstanding timer so it cannot fire spuriously afterwards.
    /// Otherwise changes wait: an existing timer covers them, or a new
    /// one-shot is scheduled for the configured interval.
    pub fn note_changes(
        &mut self,
        immediate: bool,
        timer: &mut dyn TimerDriver,
    ) -> SendDecision {
        if !self.config.enabled || immediate {
            if let Some(id) = self.pending.take() {
                timer.cancel(id);
            }
            return SendDecision::Immediate;
        }
        if self.pending.is_none() {
            self.pending = Some(timer.schedule(self.config.interval));
        }
        SendDecision::Deferred
    }

    /// Handle a timer callback. Returns true when the handle matches the
    /// pending timer (which it releases); a stale handle is ignored.
    pub fn on_timer_fired(&mut self, id: TimerId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Cancel any outstanding timer (forced flush, shutdown). Returns true
    /// when a timer was actually cancelled.
    pub fn cancel_pending(&mut self, timer: &mut dyn TimerDriver) -> bool {
        match self.pending.take() {
            Some(id) => {
                timer.cancel(id);
                true
            }
            None => false,
        }
    }
}

/// Deterministic timer driver for tests and single-threaded harnesses.
///
/// Timers never fire on their own; the harness pops them and invokes the
/// listener's timer callback itself, which matches the owning-dispatch-context
/// contract exactly.
#[derive(Debug, Default)]
pub struct ManualTimer {
    next_id: u64,
    scheduled: Vec<(TimerId, Duration)>,
    cancelled: Vec<TimerId>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest scheduled timer, as if its deadline elapsed.
    pub fn fire_next(&mut self) -> Option<TimerId> {
        if self.scheduled.is_empty() {
            None
        } else {
            Some(self.scheduled.remove(0).0)
        }
    }

    pub fn pending_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn cancelled_count(&self) -> usize {
        self.cancelled.len()
    }
}

impl TimerDriver for ManualTimer {
    fn schedule(&mut self, interval: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.scheduled.push((id, interval));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.scheduled.retain(|(t, _)| *t != id);
        self.cancelled.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(interval_ms: u64) -> ConflationController {
        ConflationController::new(ConflationConfig {
            enabled: true,
            interval: Duration::from_millis(interval_ms),
        })
    }

    #[test]
    fn test_disabled_always_immediate() {
        let mut ctl = ConflationController::new(ConflationConfig::default());
        let mut timer = ManualTimer::new();
        assert_eq!(
            ctl.note_changes(false, &mut timer),
            SendDecision::Immediate
        );
        assert_eq!(timer.pending_count(), 0);
    }

    #[test]
    fn test_single_pending_timer() {
        let mut ctl = enabled(500);
        let mut timer = ManualTimer::new();

        assert_eq!(ctl.note_changes(false, &mut timer), SendDecision::Deferred);
        assert!(ctl.has_pending());
        // second burst waits for the already-scheduled timer
        assert_eq!(ctl.note_changes(false, &mut timer), SendDecision::Deferred);
        assert_eq!(timer.pending_count(), 1);
    }

    #[test]
    fn test_timer_fire_releases_handle() {
        let mut ctl = enabled(500);
        let mut timer = ManualTimer::new();
        ctl.note_changes(false, &mut timer);

        let id = timer.fire_next().unwrap();
        assert!(ctl.on_timer_fired(id));
        assert!(!ctl.has_pending());
        // one-shot: the same handle is consumed
        assert!(!ctl.on_timer_fired(id));
    }

    #[test]
    fn test_immediate_cancels_pending() {
        let mut ctl = enabled(500);
        let mut timer = ManualTimer::new();
        ctl.note_changes(false, &mut timer);

        assert_eq!(ctl.note_changes(true, &mut timer), SendDecision::Immediate);
        assert!(!ctl.has_pending());
        assert_eq!(timer.pending_count(), 0);
        assert_eq!(timer.cancelled_count(), 1);
    }

    #[test]
    fn test_cancel_pending_on_force_flush() {
        let mut ctl = enabled(500);
        let mut timer = ManualTimer::new();
        ctl.note_changes(false, &mut timer);

        assert!(ctl.cancel_pending(&mut timer));
        assert!(!ctl.cancel_pending(&mut timer));
        // the cancelled timer firing late is ignored
        assert!(!ctl.on_timer_fired(TimerId(1)));
    }
}
