//! The tape itself: playhead transport, track reads and writes, splicing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use spool_core::{Frame, TapeSlice, TapeTime, NUM_TRACKS};

use crate::config::TapeConfig;
use crate::error::{Error, Result};
use crate::ring::CAPACITY;
use crate::shared::TapeShared;
use crate::storage::TapeStorage;
use crate::streamer::{Streamer, StreamerCommand};

const CAP: i64 = CAPACITY as i64;

/// How long a lift waits for the streamer to materialize the audio.
const LIFT_TIMEOUT: Duration = Duration::from_secs(10);

/// A multi-track virtual tape.
///
/// Owns the in-memory window, the per-track slice index, and the background
/// streamer thread that keeps the window synchronized with storage. Reads
/// and writes operate at the playhead and never block on storage; splice
/// operations (`lift`, `drop`, `cut`, `glue`) edit the slice index.
///
/// Dropping the tape shuts the streamer down after a final flush.
pub struct Tape {
    shared: Arc<TapeShared>,
    streamer: Streamer,
    config: TapeConfig,
}

impl Tape {
    /// Tape over `storage` with the default configuration.
    pub fn new(storage: impl TapeStorage + 'static) -> Result<Self> {
        Self::with_config(storage, TapeConfig::default())
    }

    pub fn with_config(storage: impl TapeStorage + 'static, config: TapeConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(TapeShared::new());
        let streamer = Streamer::spawn(Arc::clone(&shared), Box::new(storage), config)?;
        Ok(Self {
            shared,
            streamer,
            config,
        })
    }

    pub fn config(&self) -> &TapeConfig {
        &self.config
    }

    /// Current playhead position in frames. May be negative.
    pub fn position(&self) -> TapeTime {
        self.shared.ring.position()
    }

    /// Moves the playhead to `pos`.
    ///
    /// Within the valid window this is instant and loss-free; a jump outside
    /// it empties the window and the streamer reloads around the new
    /// position. Reads issued before the reload lands count as underrun.
    pub fn go_to(&self, pos: TapeTime) {
        if self.shared.ring.go_to(pos) {
            self.streamer.notify(StreamerCommand::Jumped);
        } else {
            self.streamer.notify(StreamerCommand::Nudge);
        }
    }

    /// Playhead position as `mm:ss.ss` at the configured sample rate.
    /// Negative positions display as zero.
    pub fn time_str(&self) -> String {
        let secs_total = self.position().max(0) as f64 / self.config.sample_rate;
        let mins = (secs_total / 60.0) as u64;
        let secs = secs_total % 60.0;
        format!("{mins:0>2}:{secs:0>5.2}")
    }

    /// Reads `out.len()` frames of one track moving forward from the
    /// playhead. Frames not yet buffered come back as silence; the return
    /// value is their count. The playhead always advances by the full
    /// request.
    pub fn read_fw(&self, track: usize, out: &mut [f32]) -> Result<usize> {
        self.check_track(track)?;
        let underrun = self.shared.ring.consume_fw(track, out);
        self.shared.metrics.record_underrun(underrun);
        self.streamer.notify(StreamerCommand::Nudge);
        Ok(underrun as usize)
    }

    /// Backward counterpart of [`Tape::read_fw`]; output is in read order
    /// (reversed tape order) and the playhead moves backward.
    pub fn read_bw(&self, track: usize, out: &mut [f32]) -> Result<usize> {
        self.check_track(track)?;
        let underrun = self.shared.ring.consume_bw(track, out);
        self.shared.metrics.record_underrun(underrun);
        self.streamer.notify(StreamerCommand::Nudge);
        Ok(underrun as usize)
    }

    /// Reads all four tracks at once moving forward. Returns the underrun
    /// frame count.
    pub fn read_all_fw(&self, out: &mut [Frame]) -> usize {
        let underrun = self.shared.ring.consume_all_fw(out);
        self.shared.metrics.record_underrun(underrun);
        self.streamer.notify(StreamerCommand::Nudge);
        underrun as usize
    }

    /// Reads all four tracks at once moving backward, in read order.
    pub fn read_all_bw(&self, out: &mut [Frame]) -> usize {
        let underrun = self.shared.ring.consume_all_bw(out);
        self.shared.metrics.record_underrun(underrun);
        self.streamer.notify(StreamerCommand::Nudge);
        underrun as usize
    }

    /// Records `data` onto one track as material just played: the last input
    /// frame lands at `play_point - 1`.
    ///
    /// `recording` accumulates the covering slice of the whole take; pass the
    /// same slice across the calls of one recording pass, starting from
    /// [`TapeSlice::none`]. Returns the count of frames that could not be
    /// placed because they fell outside the addressable window (zero when the
    /// write landed whole). The shortfall is also counted as write overflow.
    pub fn write_fw(
        &self,
        track: usize,
        data: &[f32],
        recording: &mut TapeSlice,
    ) -> Result<usize> {
        self.check_track(track)?;
        let n = data.len() as i64;
        let pp = self.shared.ring.position();
        let span = TapeSlice::new((pp - n).max(pp - CAP).max(0), pp);
        if span.is_empty() {
            self.shared.metrics.record_overflow(n as u64);
            return Ok(n as usize);
        }
        let head_drop = (span.start - (pp - n)) as usize;
        self.commit_write(track, span, &data[head_drop..], false, n, recording)
    }

    /// Records `data` onto one track as material about to play backward:
    /// `data` arrives in read order, so its last frame lands at the playhead.
    /// Returns the unwritten frame count like [`Tape::write_fw`].
    pub fn write_bw(
        &self,
        track: usize,
        data: &[f32],
        recording: &mut TapeSlice,
    ) -> Result<usize> {
        self.check_track(track)?;
        let n = data.len() as i64;
        let pp = self.shared.ring.position();
        let span = TapeSlice::new(pp.max(0), (pp + n).min(pp + CAP));
        if span.is_empty() {
            self.shared.metrics.record_overflow(n as u64);
            return Ok(n as usize);
        }
        let head_drop = (span.start - pp) as usize;
        let end_drop = ((pp + n) - span.end) as usize;
        let view = &data[end_drop..n as usize - head_drop];
        self.commit_write(track, span, view, true, n, recording)
    }

    fn commit_write(
        &self,
        track: usize,
        span: TapeSlice,
        view: &[f32],
        reversed: bool,
        requested: i64,
        recording: &mut TapeSlice,
    ) -> Result<usize> {
        {
            let mut pending = self.shared.pending.lock();
            let cover = match pending[track] {
                Some(existing) => existing.cover(&span),
                None => span,
            };
            // The pending cover must stay addressable in the ring until the
            // streamer flushes it; a write that would break that is rejected
            // whole rather than silently losing earlier samples.
            if cover.len() > CAP {
                self.shared.metrics.record_overflow(requested as u64);
                self.streamer.notify(StreamerCommand::Flush);
                return Ok(requested as usize);
            }
            // Samples land before the span becomes pending, under the same
            // lock, so a concurrent flush cannot copy the span out half
            // written.
            self.shared.ring.write_span(track, span, view, reversed);
            pending[track] = Some(cover);
        }
        self.shared.ring.extend_valid(span);
        self.shared.slices.lock()[track].add_slice(span);
        self.shared.slices_changed.set(true);
        *recording = if recording.is_empty() {
            span
        } else {
            recording.cover(&span)
        };
        let unwritten = (requested - span.len()) as usize;
        self.shared.metrics.record_overflow(unwritten as u64);
        self.streamer.notify(StreamerCommand::Flush);
        Ok(unwritten)
    }

    /// Lifts the slice under the playhead off `track` into the clipboard.
    ///
    /// The audio is materialized from storage by the streamer (pending
    /// writes are flushed first); this call blocks until it is staged. The
    /// slice is removed from the track and its in-window samples silenced.
    /// Returns the lifted slice, or `None` when the playhead is not inside
    /// one.
    pub fn lift(&self, track: usize) -> Result<Option<TapeSlice>> {
        self.check_track(track)?;
        let slice = self.shared.slices.lock()[track].current(self.shared.ring.position());
        if slice.is_empty() {
            return Ok(None);
        }
        self.shared.clipboard.begin_lift(track, slice);
        self.streamer.send(StreamerCommand::Lift { track, slice })?;
        if !self.shared.clipboard.wait_staged(LIFT_TIMEOUT) {
            return Err(Error::Shutdown);
        }
        self.shared.slices.lock()[track].erase(slice);
        self.shared.slices_changed.set(true);
        self.shared.ring.blank(track, slice);
        self.streamer.notify(StreamerCommand::SlicesChanged);
        Ok(Some(slice))
    }

    /// Drops the clipboard content onto `track` starting at the playhead,
    /// merging with whatever it lands on. The clipboard's source track does
    /// not matter. Returns the frames placed; zero when the clipboard is
    /// empty.
    pub fn drop(&self, track: usize) -> Result<usize> {
        self.check_track(track)?;
        let Some((_, clip, data)) = self.shared.clipboard.take_staged() else {
            return Ok(0);
        };
        let pp = self.shared.ring.position();
        let span = TapeSlice::new(pp.max(0), (pp + clip.len()).min(pp + CAP));
        if span.is_empty() {
            self.shared.metrics.record_overflow(clip.len() as u64);
            return Ok(0);
        }
        {
            let mut pending = self.shared.pending.lock();
            let cover = match pending[track] {
                Some(existing) => existing.cover(&span),
                None => span,
            };
            if cover.len() > CAP {
                drop(pending);
                self.shared.metrics.record_overflow(clip.len() as u64);
                // Keep the clip claimable; the caller can retry after the
                // flush catches up.
                self.shared.clipboard.begin_lift(track, clip);
                self.shared.clipboard.stage(track, clip, data);
                self.streamer.notify(StreamerCommand::Flush);
                return Ok(0);
            }
            let head_drop = (span.start - pp) as usize;
            let placed = &data[head_drop..head_drop + span.len() as usize];
            self.shared.ring.write_span(track, span, placed, false);
            pending[track] = Some(cover);
        }
        self.shared.ring.extend_valid(span);
        self.shared.slices.lock()[track].add_slice(span);
        self.shared.slices_changed.set(true);
        self.shared
            .metrics
            .record_overflow((clip.len() - span.len()) as u64);
        self.streamer.notify(StreamerCommand::Flush);
        Ok(span.len() as usize)
    }

    /// Splits the slice strictly containing the playhead on `track` in two.
    /// No-op at slice boundaries or outside any slice.
    pub fn cut(&self, track: usize) -> Result<()> {
        self.check_track(track)?;
        let pos = self.shared.ring.position();
        self.shared.slices.lock()[track].cut(pos);
        self.shared.slices_changed.set(true);
        self.streamer.notify(StreamerCommand::SlicesChanged);
        Ok(())
    }

    /// Joins two slices of `track` into one spanning both, bridging any gap.
    pub fn glue(&self, track: usize, s1: TapeSlice, s2: TapeSlice) -> Result<()> {
        self.check_track(track)?;
        self.shared.slices.lock()[track].glue(s1, s2);
        self.shared.slices_changed.set(true);
        self.streamer.notify(StreamerCommand::SlicesChanged);
        Ok(())
    }

    /// All slices of one track, in start order, from the authoritative table.
    pub fn slices(&self, track: usize) -> Result<Vec<TapeSlice>> {
        self.check_track(track)?;
        Ok(self.shared.slices.lock()[track].snapshot())
    }

    /// Lock-free snapshot of one track's slices, suitable for UI threads.
    /// May lag the authoritative table by one streamer pass.
    pub fn slices_view(&self, track: usize) -> Result<Arc<Vec<TapeSlice>>> {
        self.check_track(track)?;
        Ok(self.shared.views[track].load_full())
    }

    /// Slices of one track intersecting `area`, in start order.
    pub fn slices_in(&self, track: usize, area: TapeSlice) -> Result<Vec<TapeSlice>> {
        self.check_track(track)?;
        Ok(self.shared.slices.lock()[track].slices_in(area))
    }

    /// The slice containing the playhead on `track`, if any.
    pub fn current_slice(&self, track: usize) -> Result<Option<TapeSlice>> {
        self.check_track(track)?;
        let slice = self.shared.slices.lock()[track].current(self.shared.ring.position());
        Ok(if slice.is_empty() { None } else { Some(slice) })
    }

    pub fn clipboard_is_empty(&self) -> bool {
        self.shared.clipboard.is_empty()
    }

    /// Valid frames buffered ahead of and behind the playhead.
    pub fn fill_levels(&self) -> (usize, usize) {
        self.shared.ring.fill_levels()
    }

    /// Blocks until at least `frames` are buffered ahead of the playhead,
    /// up to `timeout`. Returns whether the level was reached.
    pub fn wait_for_fill(&self, frames: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.ring.fill_levels().0 >= frames {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn metrics(&self) -> crate::metrics::TapeMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn check_track(&self, track: usize) -> Result<()> {
        if track >= NUM_TRACKS {
            return Err(Error::InvalidTrack(track));
        }
        Ok(())
    }
}
