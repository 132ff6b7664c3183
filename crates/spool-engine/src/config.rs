//! Tape engine configuration.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::ring::CAPACITY;

/// Configuration for the streamer thread and playhead bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct TapeConfig {
    /// Storage read/write batch size in frames (default: 16384).
    pub chunk_size: usize,
    /// Low-water mark in frames; the streamer tops a direction up only once
    /// the missing span reaches this size (default: 2048).
    pub low_water: usize,
    /// Frames of already-played material kept resident behind the playhead so
    /// short rewinds replay the exact prior content (default: CAPACITY / 4).
    pub backward_reserve: usize,
    /// How long the streamer sleeps between wakeups when idle (default: 5ms).
    pub poll_interval: Duration,
    /// Sample rate used for transport display only; no resampling happens
    /// anywhere in the engine (default: 44100.0).
    pub sample_rate: f64,
    /// Capacity of the facade-to-streamer command channel (default: 64).
    pub command_capacity: usize,
}

impl Default for TapeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16384,
            low_water: 2048,
            backward_reserve: CAPACITY / 4,
            poll_interval: Duration::from_millis(5),
            sample_rate: 44100.0,
            command_capacity: 64,
        }
    }
}

impl TapeConfig {
    /// Config with a custom transport sample rate.
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "chunk_size {} must be in 1..={}",
                self.chunk_size, CAPACITY
            )));
        }
        if self.low_water > self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "low_water {} exceeds chunk_size {}",
                self.low_water, self.chunk_size
            )));
        }
        if self.backward_reserve >= CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "backward_reserve {} must leave forward room below {}",
                self.backward_reserve, CAPACITY
            )));
        }
        if !(self.sample_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} must be positive",
                self.sample_rate
            )));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig(
                "command_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
