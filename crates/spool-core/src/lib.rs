//! Core value types for the spool tape engine.
//!
//! Everything here is a leaf: plain value types and lock-free primitives with
//! no I/O and no knowledge of the engine that uses them.
//!
//! - [`Frame`] - one multi-track tape frame of `f32` samples
//! - [`Section`] - generic half-open `[start, end)` interval
//! - [`lockfree`] - cache-line aligned atomic wrappers for RT-safe state

pub mod frame;
pub mod lockfree;
pub mod section;

pub use frame::{Frame, NUM_TRACKS};
pub use lockfree::{AtomicFlag, AtomicLength, AtomicTapeTime};
pub use section::{Section, TapeSlice, TapeTime};
