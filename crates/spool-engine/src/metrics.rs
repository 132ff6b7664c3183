//! Engine counters surfaced to callers and the UI.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for a tape instance.
///
/// Everything is a relaxed atomic: these are observability counters, not
/// synchronization points.
#[derive(Debug, Default)]
pub struct TapeMetrics {
    underrun_frames: AtomicU64,
    overflow_frames: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    storage_errors: AtomicU64,
    refills: AtomicU64,
}

impl TapeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_underrun(&self, frames: u64) {
        if frames > 0 {
            self.underrun_frames.fetch_add(frames, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_overflow(&self, frames: u64) {
        if frames > 0 {
            self.overflow_frames.fetch_add(frames, Ordering::Relaxed);
        }
    }

    pub fn record_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refill(&self) {
        self.refills.fetch_add(1, Ordering::Relaxed);
    }

    pub fn underrun_frames(&self) -> u64 {
        self.underrun_frames.load(Ordering::Relaxed)
    }

    pub fn storage_errors(&self) -> u64 {
        self.storage_errors.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> TapeMetricsSnapshot {
        TapeMetricsSnapshot {
            underrun_frames: self.underrun_frames.load(Ordering::Relaxed),
            overflow_frames: self.overflow_frames.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`TapeMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TapeMetricsSnapshot {
    /// Frames returned as silence because no valid data was buffered.
    pub underrun_frames: u64,
    /// Frames rejected by writes because they fell outside the window.
    pub overflow_frames: u64,
    /// Bytes read from persistent storage.
    pub bytes_read: u64,
    /// Bytes written to persistent storage.
    pub bytes_written: u64,
    /// Storage operations that failed and were left for retry.
    pub storage_errors: u64,
    /// Completed refill batches.
    pub refills: u64,
}
