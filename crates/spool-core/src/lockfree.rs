//! Lock-free primitives for real-time tape access.
//!
//! All wrappers are cache-line aligned so adjacent fields never share a line
//! between the audio caller and the streamer thread.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::section::TapeTime;

/// Cache-line aligned atomic tape position.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicTapeTime {
    value: AtomicI64,
}

impl AtomicTapeTime {
    pub fn new(value: TapeTime) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> TapeTime {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: TapeTime) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn fetch_add(&self, delta: TapeTime) -> TapeTime {
        self.value.fetch_add(delta, Ordering::AcqRel)
    }
}

impl Default for AtomicTapeTime {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Cache-line aligned atomic frame count.
///
/// Stored signed so arithmetic never wraps; [`AtomicLength::set`] clamps at
/// zero, matching "a length can shrink to empty, never below".
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicLength {
    value: AtomicI64,
}

impl AtomicLength {
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value.max(0)),
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value.max(0), Ordering::Release);
    }

    /// Applies `f` to the current value until the update sticks, clamping
    /// the result at zero. Returns the stored value.
    pub fn update(&self, mut f: impl FnMut(i64) -> i64) -> i64 {
        let mut current = self.value.load(Ordering::Acquire);
        loop {
            let new = f(current).max(0);
            match self.value.compare_exchange_weak(
                current,
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return new,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicLength {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}
