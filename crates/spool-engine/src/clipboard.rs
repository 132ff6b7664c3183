//! Single-slot staging area for splice operations.
//!
//! A bounded one-item rendezvous between the facade (which requests a lift
//! and later drops the content) and the streamer thread (which materializes
//! the audio from storage). The explicit tri-state avoids the ambiguity
//! between "never lifted" and "lifted then dropped".

use parking_lot::{Condvar, Mutex};
use spool_core::TapeSlice;

#[derive(Debug)]
enum ClipState {
    /// Nothing staged.
    Empty,
    /// A lift was requested; the streamer has not materialized it yet.
    Pending { track: usize, slice: TapeSlice },
    /// Audio is staged and ready to be dropped.
    Staged {
        track: usize,
        slice: TapeSlice,
        data: Vec<f32>,
    },
}

/// Lifted-region staging slot.
///
/// Guarded by its own lock; completion of a pending transfer is signaled on
/// the condvar so waiters block only as long as necessary, never on the
/// real-time path.
#[derive(Debug)]
pub struct Clipboard {
    state: Mutex<ClipState>,
    done: Condvar,
}

impl Clipboard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClipState::Empty),
            done: Condvar::new(),
        }
    }

    /// Marks a lift in flight. A new lift supersedes any prior unclaimed
    /// content.
    pub fn begin_lift(&self, track: usize, slice: TapeSlice) {
        let mut state = self.state.lock();
        *state = ClipState::Pending { track, slice };
    }

    /// Called by the streamer once the audio is materialized. Ignored when
    /// the request was superseded by a newer lift of a different region.
    pub fn stage(&self, track: usize, slice: TapeSlice, data: Vec<f32>) {
        let mut state = self.state.lock();
        match *state {
            ClipState::Pending {
                track: want_track,
                slice: want_slice,
            } if want_track == track && want_slice == slice => {
                *state = ClipState::Staged { track, slice, data };
                self.done.notify_all();
            }
            _ => {}
        }
    }

    /// Blocks until the pending lift is staged, up to `timeout`. Returns
    /// false on timeout (or if nothing was pending and nothing is staged).
    pub fn wait_staged(&self, timeout: std::time::Duration) -> bool {
        let mut state = self.state.lock();
        let result = self
            .done
            .wait_while_for(&mut state, |s| matches!(s, ClipState::Pending { .. }), timeout);
        !result.timed_out() && matches!(*state, ClipState::Staged { .. })
    }

    /// Claims the staged content, clearing the slot.
    pub fn take_staged(&self) -> Option<(usize, TapeSlice, Vec<f32>)> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, ClipState::Empty) {
            ClipState::Staged { track, slice, data } => Some((track, slice, data)),
            other => {
                // A pending lift is not claimable; put it back.
                *state = other;
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self.state.lock(), ClipState::Empty)
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new()
    }
}
