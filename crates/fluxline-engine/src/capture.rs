//! One-shot snapshot arming cell.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Idle/armed cell racing control threads against the execution thread.
///
/// Encodes the optional capture size in a single atomic: `0` is idle,
/// `n > 0` is armed with batch size `n`. The runner consumes the cell with
/// one [`armed`](CaptureCell::armed) load at the top of each batch and
/// clears it with [`disarm`](CaptureCell::disarm) only after the snapshot
/// stored durably; a re-arm that lands in between wins the race and
/// produces its own capture on a later batch.
#[derive(Debug, Default)]
pub(crate) struct CaptureCell {
    armed: AtomicUsize,
}

impl CaptureCell {
    pub(crate) fn new() -> Self {
        Self {
            armed: AtomicUsize::new(0),
        }
    }

    /// Arm the cell with a capture batch size. Last write wins.
    ///
    /// Callers validate `size > 0`; arming with 0 would read as idle.
    pub(crate) fn arm(&self, size: usize) {
        self.armed.store(size, Ordering::Release);
    }

    /// Read the armed size, if any.
    pub(crate) fn armed(&self) -> Option<usize> {
        match self.armed.load(Ordering::Acquire) {
            0 => None,
            size => Some(size),
        }
    }

    /// Return to idle after consuming an arm of `size`.
    ///
    /// Compare-exchange so a concurrent re-arm (same or different size
    /// stored after the consuming load) is never wiped: if the cell no
    /// longer holds `size`, the newer arm stays.
    pub(crate) fn disarm(&self, size: usize) {
        let _ = self
            .armed
            .compare_exchange(size, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}
