//! Sequence-number and sender-identity continuity tracking.
//!
//! On every non-snapshot update the detector observes the message sequence
//! number and sender identity. A repeated sequence number marks the message
//! as a resend to be ignored entirely; a jump records the missing span. A gap
//! that coincides with a sender change (failover) is reported but does not by
//! itself invalidate the book.

use crate::types::GapInfo;

/// Outcome of observing one (sequence, sender) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    /// First message observed on this stream
    First,
    /// Exactly one greater than the last seen value
    InOrder,
    /// Equal to the last seen value: duplicate/resend, ignore entirely
    Duplicate,
    /// Discontinuity; `same_sender` is false across a sender failover
    Gap { info: GapInfo, same_sender: bool },
}

/// Tracks last-seen sequence number and sender identity for one stream.
#[derive(Debug, Clone, Default)]
pub struct GapDetector {
    last_seq: Option<u64>,
    last_sender: Option<u64>,
    gaps_detected: u64,
    duplicates: u64,
}

impl GapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one update's sequence number and sender identity.
    ///
    /// Advances the last-seen state in every non-duplicate case, including
    /// gaps, so one discontinuity is reported exactly once.
    pub fn observe(&mut self, seq: u64, sender: u64) -> SeqCheck {
        let result = match self.last_seq {
            None => SeqCheck::First,
            Some(last) if seq == last => {
                self.duplicates += 1;
                return SeqCheck::Duplicate;
            }
            Some(last) if seq == last.wrapping_add(1) => SeqCheck::InOrder,
            Some(last) => {
                self.gaps_detected += 1;
                SeqCheck::Gap {
                    info: GapInfo::new(last.wrapping_add(1), seq.wrapping_sub(1)),
                    same_sender: self.last_sender == Some(sender),
                }
            }
        };
        self.last_seq = Some(seq);
        self.last_sender = Some(sender);
        result
    }

    /// Seed the detector from a full-state message so the first subsequent
    /// update is gap-checked against the snapshot's sequence number.
    pub fn seed(&mut self, seq: u64, sender: u64) {
        self.last_seq = Some(seq);
        self.last_sender = Some(sender);
    }

    pub fn reset(&mut self) {
        self.last_seq = None;
        self.last_sender = None;
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}
