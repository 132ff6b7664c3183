//! # Spool - Disk-backed Virtual Tape
//!
//! A multi-track reel-to-reel tape emulator built from two crates:
//! - **spool-core** - Shared primitives (frames, time sections, lock-free atomics)
//! - **spool-engine** - The tape itself (ring window, streamer thread, slice
//!   index, clipboard splicing, storage backends)
//!
//! ## Quick Start
//!
//! ```no_run
//! use spool::{MemStorage, Tape, TapeSlice};
//!
//! let tape = Tape::new(MemStorage::new())?;
//!
//! // Record a take onto track 0.
//! let mut take = TapeSlice::none();
//! tape.go_to(1024);
//! tape.write_fw(0, &[0.1; 1024], &mut take)?;
//!
//! // Play it back.
//! tape.go_to(0);
//! let mut out = [0.0f32; 1024];
//! let underrun = tape.read_fw(0, &mut out)?;
//! # Ok::<(), spool::Error>(())
//! ```

/// Re-export of spool-core for direct access
pub use spool_core as core;

/// Re-export of spool-engine for direct access
pub use spool_engine as engine;

// Primitives
pub use spool_core::{
    AtomicFlag,
    AtomicLength,
    AtomicTapeTime,
    Frame,
    Section,
    TapeSlice,
    TapeTime,
    NUM_TRACKS,
};

// The tape engine
pub use spool_engine::{
    export_track_wav,
    DirStorage,
    Error,
    MemStorage,
    Result,
    SliceSet,
    Tape,
    TapeConfig,
    TapeMetricsSnapshot,
    TapeStorage,
    CAPACITY,
};
