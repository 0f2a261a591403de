//! Last observed dispatch sequence number
//!
//! Written synchronously by the receive loop before a dispatch frame is fanned
//! out, read by the heartbeat monitor before every heartbeat. The value only
//! ever moves forward, so a reader never sees anything older than the most
//! recently processed dispatch frame.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic sequence number shared between the receive loop and heartbeat
///
/// `0` means no dispatch has been observed yet; the gateway starts counting at 1.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: AtomicU64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence number from a dispatch frame
    ///
    /// Returns the value now stored, which is `sequence` unless a larger one
    /// was already recorded.
    #[inline]
    pub fn observe(&self, sequence: u64) -> u64 {
        let previous = self.last.fetch_max(sequence, Ordering::AcqRel);
        previous.max(sequence)
    }

    /// Last observed sequence number, `None` before the first dispatch
    #[inline]
    pub fn current(&self) -> Option<u64> {
        match self.last.load(Ordering::Acquire) {
            0 => None,
            seq => Some(seq),
        }
    }
}
