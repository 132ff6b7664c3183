//! State shared between the facade and the streamer thread.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

use spool_core::{AtomicFlag, TapeSlice, NUM_TRACKS};

use crate::clipboard::Clipboard;
use crate::metrics::TapeMetrics;
use crate::ring::Ring;
use crate::slices::SliceSet;

/// Everything both sides of the tape touch, behind one `Arc`.
///
/// The ring and metrics are fully atomic. The slice tables and the pending
/// write spans sit behind short-lived mutexes; the streamer republishes each
/// track's slice table into `views` whenever it changes, so readers that
/// cannot block get a consistent snapshot without taking the lock.
pub(crate) struct TapeShared {
    pub ring: Ring,
    pub slices: Mutex<[SliceSet; NUM_TRACKS]>,
    /// Lock-free per-track snapshots of `slices`, maintained by the streamer.
    pub views: [ArcSwap<Vec<TapeSlice>>; NUM_TRACKS],
    /// Raised by the facade on any slice mutation; the streamer swaps it off
    /// before republishing `views`, skipping the table lock on idle passes.
    pub slices_changed: AtomicFlag,
    /// Written-but-unflushed span per track, merged as writes accumulate.
    pub pending: Mutex<[Option<TapeSlice>; NUM_TRACKS]>,
    pub clipboard: Clipboard,
    pub metrics: TapeMetrics,
}

impl TapeShared {
    pub fn new() -> Self {
        Self {
            ring: Ring::new(),
            slices: Mutex::new(std::array::from_fn(|_| SliceSet::new())),
            views: std::array::from_fn(|_| ArcSwap::new(Arc::new(Vec::new()))),
            slices_changed: AtomicFlag::new(false),
            pending: Mutex::new([None; NUM_TRACKS]),
            clipboard: Clipboard::new(),
            metrics: TapeMetrics::new(),
        }
    }

    /// Folds a freshly written span into the track's pending span.
    pub fn merge_pending(&self, track: usize, span: TapeSlice) {
        let mut pending = self.pending.lock();
        pending[track] = Some(match pending[track] {
            Some(existing) => existing.cover(&span),
            None => span,
        });
    }
}
