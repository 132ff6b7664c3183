//! Position-addressed circular frame store.
//!
//! Every absolute tape position `p` maps to the fixed slot `wrap(p)`, so
//! content the streamer loads for a span stays addressable even when the
//! playhead moves while the I/O is in flight. Validity is published through
//! atomic forward/backward lengths around the playhead plus a window epoch
//! that jumps bump; the streamer checks the epoch before publishing so stale
//! I/O is completed and then ignored.

use std::sync::atomic::{AtomicU64, Ordering};

use atomic_float::AtomicF32;
use spool_core::{AtomicLength, AtomicTapeTime, Frame, TapeSlice, TapeTime, NUM_TRACKS};

/// Ring capacity in frames (2^18).
pub const CAPACITY: usize = 1 << 18;

const CAP: i64 = CAPACITY as i64;

/// Fixed-capacity circular store of audio frames.
///
/// All bookkeeping is atomic; sample slots are relaxed atomics published by
/// the length updates. Invariant: `len_fw + len_bw <= CAPACITY`.
pub struct Ring {
    /// `CAPACITY * NUM_TRACKS` samples, frame-interleaved.
    data: Box<[AtomicF32]>,
    play_point: AtomicTapeTime,
    /// Buffer-relative playhead slot, `wrap(play_point)`.
    play_idx: AtomicTapeTime,
    /// Tape position currently represented by buffer slot 0.
    pos_at_zero: AtomicTapeTime,
    len_fw: AtomicLength,
    len_bw: AtomicLength,
    epoch: AtomicU64,
}

impl Ring {
    pub fn new() -> Self {
        let data = (0..CAPACITY * NUM_TRACKS)
            .map(|_| AtomicF32::new(0.0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            data,
            play_point: AtomicTapeTime::new(0),
            play_idx: AtomicTapeTime::new(0),
            pos_at_zero: AtomicTapeTime::new(0),
            len_fw: AtomicLength::new(0),
            len_bw: AtomicLength::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Maps any tape position into a buffer slot; negative positions wrap
    /// from the end.
    #[inline]
    pub fn wrap(pos: TapeTime) -> usize {
        pos.rem_euclid(CAP) as usize
    }

    #[inline]
    fn load(&self, pos: TapeTime, track: usize) -> f32 {
        self.data[Self::wrap(pos) * NUM_TRACKS + track].load(Ordering::Relaxed)
    }

    #[inline]
    fn store(&self, pos: TapeTime, track: usize, sample: f32) {
        self.data[Self::wrap(pos) * NUM_TRACKS + track].store(sample, Ordering::Relaxed);
    }

    pub fn position(&self) -> TapeTime {
        self.play_point.get()
    }

    pub fn play_idx(&self) -> i64 {
        self.play_idx.get()
    }

    pub fn pos_at_zero(&self) -> TapeTime {
        self.pos_at_zero.get()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Valid frames ahead of and behind the playhead.
    pub fn fill_levels(&self) -> (usize, usize) {
        (self.len_fw.get() as usize, self.len_bw.get() as usize)
    }

    /// Consumes `out.len()` frames of one track moving forward.
    ///
    /// The valid prefix is copied, the remainder is silence, and the playhead
    /// advances by the full request either way. Returns the underrun count.
    pub fn consume_fw(&self, track: usize, out: &mut [f32]) -> u64 {
        let n = out.len() as i64;
        let pp = self.play_point.get();
        let valid = self.len_fw.get().min(n);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if (i as i64) < valid {
                self.load(pp + i as i64, track)
            } else {
                0.0
            };
        }
        self.advance(n);
        (n - valid) as u64
    }

    /// Consumes `out.len()` frames of one track moving backward.
    ///
    /// Output is in read order, i.e. reversed tape order, starting with the
    /// frame just behind the playhead. Returns the underrun count.
    pub fn consume_bw(&self, track: usize, out: &mut [f32]) -> u64 {
        let n = out.len() as i64;
        let pp = self.play_point.get();
        let valid = self.len_bw.get().min(n);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = if (i as i64) < valid {
                self.load(pp - 1 - i as i64, track)
            } else {
                0.0
            };
        }
        self.advance(-n);
        (n - valid) as u64
    }

    /// [`Ring::consume_fw`] across all four tracks at once.
    pub fn consume_all_fw(&self, out: &mut [Frame]) -> u64 {
        let n = out.len() as i64;
        let pp = self.play_point.get();
        let valid = self.len_fw.get().min(n);
        for (i, frame) in out.iter_mut().enumerate() {
            *frame = if (i as i64) < valid {
                self.load_frame(pp + i as i64)
            } else {
                Frame::SILENT
            };
        }
        self.advance(n);
        (n - valid) as u64
    }

    /// [`Ring::consume_bw`] across all four tracks at once.
    pub fn consume_all_bw(&self, out: &mut [Frame]) -> u64 {
        let n = out.len() as i64;
        let pp = self.play_point.get();
        let valid = self.len_bw.get().min(n);
        for (i, frame) in out.iter_mut().enumerate() {
            *frame = if (i as i64) < valid {
                self.load_frame(pp - 1 - i as i64)
            } else {
                Frame::SILENT
            };
        }
        self.advance(-n);
        (n - valid) as u64
    }

    fn load_frame(&self, pos: TapeTime) -> Frame {
        let mut frame = Frame::SILENT;
        for track in 0..NUM_TRACKS {
            frame[track] = self.load(pos, track);
        }
        frame
    }

    /// Moves the playhead by `delta` frames, transferring consumed validity
    /// to the opposite direction so just-played material stays replayable.
    fn advance(&self, delta: i64) {
        if delta == 0 {
            return;
        }
        if delta > 0 {
            let consumed = self.len_fw.get().min(delta);
            let fw = self.len_fw.update(|v| v - delta);
            self.len_bw.update(|v| (v + consumed).min(CAP - fw));
        } else {
            let consumed = self.len_bw.get().min(-delta);
            let bw = self.len_bw.update(|v| v + delta);
            self.len_fw.update(|v| (v + consumed).min(CAP - bw));
        }
        let new_pp = self.play_point.get() + delta;
        self.set_play_point(new_pp);
    }

    fn set_play_point(&self, pos: TapeTime) {
        let idx = Self::wrap(pos) as i64;
        self.play_point.set(pos);
        self.play_idx.set(idx);
        self.pos_at_zero.set(pos - idx);
    }

    /// Jumps the playhead to `pos`.
    ///
    /// Inside the valid window the lengths are clipped around the new point;
    /// outside it both lengths are zeroed and the epoch is bumped so the
    /// streamer reloads around the new anchor. Returns true for the latter.
    pub fn go_to(&self, pos: TapeTime) -> bool {
        let pp = self.play_point.get();
        let lo = pp - self.len_bw.get();
        let hi = pp + self.len_fw.get();
        let jumped = pos < lo || pos > hi;
        if jumped {
            self.len_fw.set(0);
            self.len_bw.set(0);
            self.epoch.fetch_add(1, Ordering::AcqRel);
        } else {
            self.len_fw.set(hi - pos);
            self.len_bw.set(pos - lo);
        }
        self.set_play_point(pos);
        jumped
    }

    /// Publishes freshly loaded forward content.
    ///
    /// `span` must continue the current valid region (its start at
    /// `play_point + len_fw`) and `epoch` must still be current, otherwise
    /// the load was for a stale window and is dropped.
    pub fn publish_fw(&self, span: TapeSlice, epoch: u64) -> bool {
        if self.epoch() != epoch {
            return false;
        }
        let pp = self.play_point.get();
        if span.start != pp + self.len_fw.get() {
            return false;
        }
        let new_fw = (span.end - pp).clamp(0, CAP);
        self.len_fw.set(new_fw);
        self.len_bw.update(|v| v.min(CAP - new_fw));
        true
    }

    /// Backward counterpart of [`Ring::publish_fw`]; `span.end` must sit at
    /// `play_point - len_bw`.
    pub fn publish_bw(&self, span: TapeSlice, epoch: u64) -> bool {
        if self.epoch() != epoch {
            return false;
        }
        let pp = self.play_point.get();
        if span.end != pp - self.len_bw.get() {
            return false;
        }
        let new_bw = (pp - span.start).clamp(0, CAP);
        self.len_bw.set(new_bw);
        self.len_fw.update(|v| v.min(CAP - new_bw));
        true
    }

    /// Shrinks the backward window to at most `keep` frames, releasing the
    /// slots beyond it for reuse. Concurrent transfers from forward
    /// consumption fold into the CAS.
    pub fn trim_bw(&self, keep: i64) {
        self.len_bw.update(|v| v.min(keep.max(0)));
    }

    /// Stores `data` into one track over `span`.
    ///
    /// With `reversed`, `data` is taken back-to-front (the layout incoming
    /// backward writes arrive in). `data.len()` must equal `span.len()`.
    pub fn write_span(&self, track: usize, span: TapeSlice, data: &[f32], reversed: bool) {
        debug_assert_eq!(data.len() as i64, span.len());
        for (i, pos) in (span.start..span.end).enumerate() {
            let sample = if reversed { data[data.len() - 1 - i] } else { data[i] };
            self.store(pos, track, sample);
        }
    }

    /// Grows the valid window to cover a span just written through the
    /// playhead. The span must be anchored at the playhead (writes always
    /// are), so no gap can be claimed valid.
    pub fn extend_valid(&self, span: TapeSlice) {
        if span.is_empty() {
            return;
        }
        let pp = self.play_point.get();
        if span.start < pp {
            let behind = (pp - span.start).min(CAP);
            let fw = self.len_fw.get();
            self.len_bw.update(|v| v.max(behind.min(CAP - fw)));
        }
        if span.end > pp {
            let ahead = (span.end - pp).min(CAP);
            let bw = self.len_bw.get();
            self.len_fw.update(|v| v.max(ahead.min(CAP - bw)));
        }
    }

    /// Copies one track's samples over `span` out of the ring.
    pub fn copy_out(&self, track: usize, span: TapeSlice, out: &mut [f32]) {
        debug_assert_eq!(out.len() as i64, span.len());
        for (i, pos) in (span.start..span.end).enumerate() {
            out[i] = self.load(pos, track);
        }
    }

    /// Silences the in-window portion of `span` on one track.
    ///
    /// Positions outside the valid window are left alone; their slots alias
    /// other tape positions and will be refreshed on demand anyway.
    pub fn blank(&self, track: usize, span: TapeSlice) {
        let pp = self.play_point.get();
        let window = TapeSlice::new(pp - self.len_bw.get(), pp + self.len_fw.get());
        if let Some(clipped) = span.intersect(&window) {
            for pos in clipped.start..clipped.end {
                self.store(pos, track, 0.0);
            }
        }
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}
