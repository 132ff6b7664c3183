//! Multi-track audio frame type.

use std::ops::{Index, IndexMut};

/// Number of tracks on the tape.
pub const NUM_TRACKS: usize = 4;

/// One tape frame: a sample for each of the four tracks.
///
/// A value type with default-silence semantics. The engine never inspects the
/// samples beyond copying them around.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame([f32; NUM_TRACKS]);

impl Frame {
    /// A silent frame.
    pub const SILENT: Frame = Frame([0.0; NUM_TRACKS]);

    pub fn new(samples: [f32; NUM_TRACKS]) -> Self {
        Frame(samples)
    }

    /// Frame with the same sample on every track.
    pub fn splat(sample: f32) -> Self {
        Frame([sample; NUM_TRACKS])
    }

    pub fn samples(&self) -> &[f32; NUM_TRACKS] {
        &self.0
    }

    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|s| *s == 0.0)
    }
}

impl From<[f32; NUM_TRACKS]> for Frame {
    fn from(samples: [f32; NUM_TRACKS]) -> Self {
        Frame(samples)
    }
}

impl Index<usize> for Frame {
    type Output = f32;

    #[inline]
    fn index(&self, track: usize) -> &f32 {
        &self.0[track]
    }
}

impl IndexMut<usize> for Frame {
    #[inline]
    fn index_mut(&mut self, track: usize) -> &mut f32 {
        &mut self.0[track]
    }
}
