//! Disk-backed multi-track virtual tape.
//!
//! A [`Tape`] keeps a fixed circular window of audio resident in memory
//! around a movable playhead while a background streamer thread keeps that
//! window synchronized with a [`TapeStorage`] backend. Audio-thread reads
//! and writes never block on storage: missing frames come back as silence
//! and are counted, written frames are flushed asynchronously.
//!
//! Recorded regions are tracked per track as non-overlapping slices, which
//! splice operations edit: `cut` splits at the playhead, `glue` joins two
//! slices, `lift` moves the slice under the playhead into a clipboard and
//! `drop` splices the clipboard back in at the playhead, on any track.
//!
//! ```no_run
//! use spool_engine::{MemStorage, Tape};
//!
//! let tape = Tape::new(MemStorage::new())?;
//! tape.go_to(0);
//! let mut out = [0.0f32; 256];
//! let underrun = tape.read_fw(0, &mut out)?;
//! # Ok::<(), spool_engine::Error>(())
//! ```

pub mod clipboard;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ring;
pub mod slices;
pub mod storage;
pub mod tape;

mod shared;
mod streamer;

pub use config::TapeConfig;
pub use error::{Error, Result};
pub use metrics::TapeMetricsSnapshot;
pub use ring::CAPACITY;
pub use slices::SliceSet;
pub use storage::{export_track_wav, DirStorage, MemStorage, TapeStorage};
pub use tape::Tape;

pub use spool_core::{Frame, Section, TapeSlice, TapeTime, NUM_TRACKS};
