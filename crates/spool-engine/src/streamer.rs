//! Background disk-streaming thread.
//!
//! The streamer owns the [`TapeStorage`] exclusively. It wakes on commands
//! from the facade or on a short poll interval, then runs the same pass each
//! time: republish changed slice tables, flush pending writes, materialize
//! any requested lift, and top the ring up around the playhead. Refill is
//! slice-gated: spans with no recorded slice become silence without touching
//! storage, so blank tape costs no I/O.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use spool_core::{TapeSlice, NUM_TRACKS};

use crate::config::TapeConfig;
use crate::error::{Error, Result};
use crate::ring::CAPACITY;
use crate::shared::TapeShared;
use crate::storage::TapeStorage;

const CAP: i64 = CAPACITY as i64;

/// Facade-to-streamer commands. Most variants carry no payload and exist to
/// cut the poll latency for the event that raised them.
#[derive(Debug)]
pub(crate) enum StreamerCommand {
    /// The playhead moved by consumption.
    Nudge,
    /// The playhead jumped outside the valid window.
    Jumped,
    /// A slice table changed; views need republishing.
    SlicesChanged,
    /// Pending writes should reach storage soon.
    Flush,
    /// Materialize `slice` of `track` into the clipboard.
    Lift { track: usize, slice: TapeSlice },
    Shutdown,
}

/// Handle to the streamer thread. Dropping it shuts the thread down and
/// joins it.
pub(crate) struct Streamer {
    sender: Sender<StreamerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Streamer {
    pub fn spawn(
        shared: Arc<TapeShared>,
        mut storage: Box<dyn TapeStorage>,
        config: TapeConfig,
    ) -> Result<Self> {
        let (sender, receiver) = bounded(config.command_capacity);
        let handle = thread::Builder::new()
            .name("spool-streamer".into())
            .spawn(move || {
                if thread_priority::set_current_thread_priority(
                    thread_priority::ThreadPriority::Max,
                )
                .is_err()
                {
                    tracing::debug!("could not raise streamer thread priority");
                }
                streamer_loop(&shared, storage.as_mut(), &config, &receiver);
            })?;
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Best-effort wakeup. A full channel means the thread is already behind
    /// on wakeups; dropping one loses nothing because every pass recomputes
    /// from shared state.
    pub fn notify(&self, cmd: StreamerCommand) {
        let _ = self.sender.try_send(cmd);
    }

    /// Delivery-guaranteed send for commands that carry a payload.
    pub fn send(&self, cmd: StreamerCommand) -> Result<()> {
        self.sender.send(cmd).map_err(|_| Error::Shutdown)
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(StreamerCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn streamer_loop(
    shared: &TapeShared,
    storage: &mut dyn TapeStorage,
    config: &TapeConfig,
    receiver: &Receiver<StreamerCommand>,
) {
    tracing::debug!(?config, "streamer thread running");
    loop {
        let mut shutdown = false;
        let mut lifts: Vec<(usize, TapeSlice)> = Vec::new();
        match receiver.recv_timeout(config.poll_interval) {
            Ok(cmd) => collect_command(cmd, &mut lifts, &mut shutdown),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => shutdown = true,
        }
        while let Ok(cmd) = receiver.try_recv() {
            collect_command(cmd, &mut lifts, &mut shutdown);
        }

        publish_views(shared);
        flush_pending(shared, storage);
        for (track, slice) in lifts {
            handle_lift(shared, storage, track, slice);
        }
        if shutdown {
            break;
        }
        refill_fw(shared, storage, config);
        prefetch_bw(shared, storage, config);
    }
    tracing::debug!("streamer thread stopped");
}

fn collect_command(
    cmd: StreamerCommand,
    lifts: &mut Vec<(usize, TapeSlice)>,
    shutdown: &mut bool,
) {
    tracing::trace!(?cmd, "streamer command");
    match cmd {
        StreamerCommand::Lift { track, slice } => lifts.push((track, slice)),
        StreamerCommand::Shutdown => *shutdown = true,
        StreamerCommand::Nudge
        | StreamerCommand::Jumped
        | StreamerCommand::SlicesChanged
        | StreamerCommand::Flush => {}
    }
}

/// Republishes any slice table that changed since the last pass. The shared
/// flag is the cheap gate; idle passes never touch the table lock.
fn publish_views(shared: &TapeShared) {
    if !shared.slices_changed.swap(false) {
        return;
    }
    let mut slices = shared.slices.lock();
    for track in 0..NUM_TRACKS {
        if slices[track].take_dirty() {
            shared.views[track].store(Arc::new(slices[track].snapshot()));
        }
    }
}

/// Writes every pending span out to storage. A failed write keeps its span
/// pending so the next pass retries it.
fn flush_pending(shared: &TapeShared, storage: &mut dyn TapeStorage) {
    let taken: [Option<TapeSlice>; NUM_TRACKS] = {
        let mut pending = shared.pending.lock();
        std::array::from_fn(|track| pending[track].take())
    };
    for (track, span) in taken.into_iter().enumerate() {
        let Some(span) = span else { continue };
        let mut buf = vec![0.0f32; span.len() as usize];
        shared.ring.copy_out(track, span, &mut buf);
        match storage.write_span(track, span, &buf) {
            Ok(written) => shared.metrics.record_write(written as u64 * 4),
            Err(err) => {
                shared.metrics.record_storage_error();
                tracing::warn!(track, ?span, %err, "flush failed, span kept pending");
                shared.merge_pending(track, span);
            }
        }
    }
}

/// Materializes a lifted slice from storage into the clipboard. Storage
/// failure degrades to silence rather than wedging the waiting facade.
fn handle_lift(shared: &TapeShared, storage: &mut dyn TapeStorage, track: usize, slice: TapeSlice) {
    let mut data = vec![0.0f32; slice.len() as usize];
    match storage.read_span(track, slice, &mut data) {
        Ok(backed) => shared.metrics.record_read(backed as u64 * 4),
        Err(err) => {
            shared.metrics.record_storage_error();
            tracing::warn!(track, ?slice, %err, "lift read failed, staging silence");
            data.fill(0.0);
        }
    }
    shared.clipboard.stage(track, slice, data);
}

/// Fills `span` on every track: silence everywhere, storage content where a
/// recorded slice overlaps. Returns false on a storage error.
///
/// Slots covered by a track's pending (unflushed) write are left untouched:
/// the ring already holds samples newer than storage there. The pending lock
/// is held across the ring write, which serializes it against the facade's
/// own locked writes.
fn load_span(shared: &TapeShared, storage: &mut dyn TapeStorage, span: TapeSlice) -> bool {
    let gated: Vec<Vec<TapeSlice>> = {
        let slices = shared.slices.lock();
        (0..NUM_TRACKS).map(|t| slices[t].slices_in(span)).collect()
    };
    let mut scratch = vec![0.0f32; span.len() as usize];
    for (track, slices) in gated.iter().enumerate() {
        scratch.fill(0.0);
        for slice in slices {
            let Some(sub) = slice.intersect(&span) else { continue };
            let off = (sub.start - span.start) as usize;
            let len = sub.len() as usize;
            match storage.read_span(track, sub, &mut scratch[off..off + len]) {
                Ok(backed) => shared.metrics.record_read(backed as u64 * 4),
                Err(err) => {
                    shared.metrics.record_storage_error();
                    tracing::warn!(track, ?sub, %err, "refill read failed");
                    return false;
                }
            }
        }
        let pending = shared.pending.lock();
        match pending[track].and_then(|p| p.intersect(&span)) {
            None => shared.ring.write_span(track, span, &scratch, false),
            Some(hole) => {
                let before = TapeSlice::new(span.start, hole.start);
                if !before.is_empty() {
                    let end = before.len() as usize;
                    shared.ring.write_span(track, before, &scratch[..end], false);
                }
                let after = TapeSlice::new(hole.end, span.end);
                if !after.is_empty() {
                    let start = (hole.end - span.start) as usize;
                    shared.ring.write_span(track, after, &scratch[start..], false);
                }
            }
        }
    }
    true
}

/// Tops the forward window up toward capacity, leaving room for the
/// backward reserve behind the playhead.
fn refill_fw(shared: &TapeShared, storage: &mut dyn TapeStorage, config: &TapeConfig) {
    loop {
        let epoch = shared.ring.epoch();
        let pp = shared.ring.position();
        let (fw, bw) = shared.ring.fill_levels();
        let (fw, bw) = (fw as i64, bw as i64);

        // Nothing can sit behind time zero, so a playhead near the start
        // gives its whole reserve to the forward direction.
        let reserve = (config.backward_reserve as i64).min(pp.max(0));
        let keep_bw = bw.max(reserve).min(config.backward_reserve as i64);
        let want = (CAP - keep_bw) - fw;
        if want < config.low_water as i64 {
            return;
        }
        // The refill span aliases slots just past the backward window's
        // tail. Release the history claim beyond `keep_bw` before any store
        // lands, so a concurrent backward read cannot return refill content
        // as valid history.
        shared.ring.trim_bw(keep_bw);
        let n = want.min(config.chunk_size as i64);
        let span = TapeSlice::new(pp + fw, pp + fw + n);
        if !load_span(shared, storage, span) {
            return;
        }
        // A jump while the load was in flight makes it stale; drop it.
        if !shared.ring.publish_fw(span, epoch) {
            return;
        }
        shared.metrics.record_refill();
    }
}

/// Loads already-recorded tape behind the playhead up to the reserve, so
/// backward play after a jump has material ready.
fn prefetch_bw(shared: &TapeShared, storage: &mut dyn TapeStorage, config: &TapeConfig) {
    loop {
        let epoch = shared.ring.epoch();
        let pp = shared.ring.position();
        let (fw, bw) = shared.ring.fill_levels();
        let (fw, bw) = (fw as i64, bw as i64);

        let target = (config.backward_reserve as i64).min(pp.max(0)).min(CAP - fw);
        let want = target - bw;
        if want < config.low_water as i64 {
            return;
        }
        let n = want.min(config.chunk_size as i64);
        let span = TapeSlice::new(pp - bw - n, pp - bw);
        if !load_span(shared, storage, span) {
            return;
        }
        if !shared.ring.publish_bw(span, epoch) {
            return;
        }
        shared.metrics.record_refill();
    }
}
