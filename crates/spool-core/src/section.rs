//! Half-open interval primitive.

/// Absolute tape position, counted in frames from the start of the tape.
///
/// Signed so that positions before the tape origin stay representable; the
/// engine decides what, if anything, backs them.
pub type TapeTime = i64;

/// A recorded region on one track.
pub type TapeSlice = Section<TapeTime>;

/// A half-open interval `[start, end)`.
///
/// An interval with `start >= end` is empty; the canonical "no section"
/// sentinel is [`Section::none`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Section<T> {
    pub start: T,
    pub end: T,
}

impl<T: Copy + Ord> Section<T> {
    pub fn new(start: T, end: T) -> Self {
        Section { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True iff `time` lies within `[start, end)`.
    pub fn contains(&self, time: T) -> bool {
        time >= self.start && time < self.end
    }

    /// True iff the two sections share at least one point.
    ///
    /// Empty sections overlap nothing.
    pub fn overlaps(&self, other: &Section<T>) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// True iff the two sections overlap or are immediately adjacent.
    pub fn touches(&self, other: &Section<T>) -> bool {
        !self.is_empty() && !other.is_empty() && self.start <= other.end && other.start <= self.end
    }

    /// Smallest section spanning both inputs, bridging any gap.
    pub fn cover(&self, other: &Section<T>) -> Section<T> {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Section {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Intersection of the two sections, or `None` when they do not overlap.
    pub fn intersect(&self, other: &Section<T>) -> Option<Section<T>> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Section {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }
}

impl Section<TapeTime> {
    /// The sentinel empty section, `[-1, -2)`.
    pub const fn none() -> Self {
        Section { start: -1, end: -2 }
    }

    /// Length in frames; zero for empty sections.
    pub fn len(&self) -> i64 {
        (self.end - self.start).max(0)
    }
}
