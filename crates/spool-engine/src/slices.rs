//! Per-track index of recorded regions.

use std::collections::BTreeMap;
use std::ops::Bound;

use spool_core::{TapeSlice, TapeTime};

/// Ordered set of non-overlapping slices on one track.
///
/// Backed by a `BTreeMap` keyed on slice start, so every operation is
/// logarithmic in the slice count. Insertion merges anything the new slice
/// overlaps or touches; `cut` is the one mutation that leaves a touching
/// pair behind, so the standing invariant is `prev.end <= next.start` for
/// every adjacent pair.
#[derive(Debug, Default)]
pub struct SliceSet {
    spans: BTreeMap<TapeTime, TapeTime>,
    dirty: bool,
}

impl SliceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Slices intersecting the half-open query `area`, in start order.
    pub fn slices_in(&self, area: TapeSlice) -> Vec<TapeSlice> {
        if area.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        // A slice starting at or before the query may still straddle into it.
        if let Some((&start, &end)) = self.spans.range(..=area.start).next_back() {
            if end > area.start {
                out.push(TapeSlice::new(start, end));
            }
        }
        for (&start, &end) in self
            .spans
            .range((Bound::Excluded(area.start), Bound::Excluded(area.end)))
        {
            out.push(TapeSlice::new(start, end));
        }
        out
    }

    /// True iff some slice contains `time`.
    pub fn in_slice(&self, time: TapeTime) -> bool {
        !self.current(time).is_empty()
    }

    /// The slice containing `time`, or the sentinel empty slice.
    pub fn current(&self, time: TapeTime) -> TapeSlice {
        if let Some((&start, &end)) = self.spans.range(..=time).next_back() {
            if end > time {
                return TapeSlice::new(start, end);
            }
        }
        TapeSlice::none()
    }

    /// Inserts `slice`, merging everything it overlaps or touches into a
    /// single covering slice.
    pub fn add_slice(&mut self, slice: TapeSlice) {
        if slice.is_empty() {
            return;
        }
        let mut merged = slice;
        // Absorb neighbors from the right end inward; anything starting past
        // the current end cannot touch, anything ending before the current
        // start cannot either, and the set is sorted, so this local scan
        // terminates after the touching run.
        while let Some((&start, &end)) = self.spans.range(..=merged.end).next_back() {
            if end < merged.start {
                break;
            }
            self.spans.remove(&start);
            merged = merged.cover(&TapeSlice::new(start, end));
        }
        self.spans.insert(merged.start, merged.end);
        self.dirty = true;
        self.assert_invariant();
    }

    /// Removes exactly `slice` if it is a member; no-op otherwise.
    pub fn erase(&mut self, slice: TapeSlice) {
        if self.spans.get(&slice.start) == Some(&slice.end) {
            self.spans.remove(&slice.start);
            self.dirty = true;
        }
    }

    /// Splits the slice strictly containing `time` into `[start, time)` and
    /// `[time, end)`; no-op at slice edges or outside any slice.
    pub fn cut(&mut self, time: TapeTime) {
        let slice = self.current(time);
        if slice.is_empty() || time == slice.start {
            return;
        }
        self.spans.remove(&slice.start);
        self.spans.insert(slice.start, time);
        self.spans.insert(time, slice.end);
        self.dirty = true;
        self.assert_invariant();
    }

    /// Removes both member slices and inserts one spanning from the earlier
    /// start to the later end, bridging any gap between them.
    pub fn glue(&mut self, s1: TapeSlice, s2: TapeSlice) {
        self.erase(s1);
        self.erase(s2);
        self.add_slice(s1.cover(&s2));
    }

    /// All slices in start order.
    pub fn snapshot(&self) -> Vec<TapeSlice> {
        self.spans
            .iter()
            .map(|(&start, &end)| TapeSlice::new(start, end))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = TapeSlice> + '_ {
        self.spans
            .iter()
            .map(|(&start, &end)| TapeSlice::new(start, end))
    }

    /// Returns and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn assert_invariant(&self) {
        if cfg!(debug_assertions) {
            let mut prev_end: Option<TapeTime> = None;
            for (&start, &end) in &self.spans {
                debug_assert!(start < end, "stored slice [{start}, {end}) is empty");
                if let Some(prev) = prev_end {
                    debug_assert!(
                        prev <= start,
                        "slices [..., {prev}) and [{start}, ...) overlap"
                    );
                }
                prev_end = Some(end);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_set() {
        let set = SliceSet::new();
        assert!(set.is_empty());
        assert!(!set.in_slice(0));
        assert!(set.current(0).is_empty());
        assert!(set.slices_in(TapeSlice::new(-100, 100)).is_empty());
    }

    /// Scenario: adjacent inserts merge, cut splits, glue restores.
    #[test]
    fn test_merge_cut_glue_cycle() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(10, 20));
        set.add_slice(TapeSlice::new(20, 30));
        assert_eq!(set.snapshot(), vec![TapeSlice::new(10, 30)]);

        set.cut(20);
        assert_eq!(
            set.snapshot(),
            vec![TapeSlice::new(10, 20), TapeSlice::new(20, 30)]
        );

        set.glue(TapeSlice::new(10, 20), TapeSlice::new(20, 30));
        assert_eq!(set.snapshot(), vec![TapeSlice::new(10, 30)]);
    }

    /// The two halves of a cut touch at the cut point and stay separate
    /// members; only insertion merges touching spans.
    #[test]
    fn test_cut_parts_coexist() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(0, 100));
        set.cut(40);
        assert_eq!(
            set.snapshot(),
            vec![TapeSlice::new(0, 40), TapeSlice::new(40, 100)]
        );
        assert_eq!(set.current(39), TapeSlice::new(0, 40));
        assert_eq!(set.current(40), TapeSlice::new(40, 100));

        set.cut(70);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_add_merges_overlap_run() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(0, 5));
        set.add_slice(TapeSlice::new(10, 15));
        set.add_slice(TapeSlice::new(20, 25));
        assert_eq!(set.len(), 3);

        // Spans the first two and touches the third.
        set.add_slice(TapeSlice::new(3, 20));
        assert_eq!(set.snapshot(), vec![TapeSlice::new(0, 25)]);
    }

    #[test]
    fn test_add_empty_is_noop(){
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::none());
        set.add_slice(TapeSlice::new(7, 7));
        assert!(set.is_empty());
        assert!(!set.take_dirty());
    }

    #[test]
    fn test_current_and_in_slice() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(5, 15));

        assert_eq!(set.current(5), TapeSlice::new(5, 15));
        assert_eq!(set.current(14), TapeSlice::new(5, 15));
        assert!(set.current(15).is_empty());
        assert!(set.current(4).is_empty());
        assert!(set.in_slice(10));
        assert!(!set.in_slice(15));
    }

    #[test]
    fn test_slices_in_straddle() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(0, 10));
        set.add_slice(TapeSlice::new(20, 30));
        set.add_slice(TapeSlice::new(40, 50));

        assert_eq!(
            set.slices_in(TapeSlice::new(5, 45)),
            vec![
                TapeSlice::new(0, 10),
                TapeSlice::new(20, 30),
                TapeSlice::new(40, 50),
            ]
        );
        assert_eq!(
            set.slices_in(TapeSlice::new(10, 20)),
            Vec::<TapeSlice>::new()
        );
        assert_eq!(
            set.slices_in(TapeSlice::new(29, 30)),
            vec![TapeSlice::new(20, 30)]
        );
    }

    #[test]
    fn test_erase_exact_match_only() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(0, 10));
        set.take_dirty();

        set.erase(TapeSlice::new(0, 9));
        assert_eq!(set.len(), 1);
        assert!(!set.take_dirty());

        set.erase(TapeSlice::new(0, 10));
        assert!(set.is_empty());
        assert!(set.take_dirty());
    }

    #[test]
    fn test_cut_edges_are_noop() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(10, 20));
        set.take_dirty();

        set.cut(10);
        set.cut(20);
        set.cut(5);
        assert_eq!(set.snapshot(), vec![TapeSlice::new(10, 20)]);
        assert!(!set.take_dirty());
    }

    #[test]
    fn test_glue_bridges_gap() {
        let mut set = SliceSet::new();
        set.add_slice(TapeSlice::new(0, 10));
        set.add_slice(TapeSlice::new(30, 40));
        set.glue(TapeSlice::new(0, 10), TapeSlice::new(30, 40));
        assert_eq!(set.snapshot(), vec![TapeSlice::new(0, 40)]);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut set = SliceSet::new();
        assert!(!set.take_dirty());

        set.add_slice(TapeSlice::new(0, 10));
        assert!(set.take_dirty());
        assert!(!set.take_dirty());

        set.cut(5);
        assert!(set.take_dirty());
    }

    proptest! {
        /// The merge invariant holds after any sequence of insertions.
        #[test]
        fn prop_no_overlapping_or_touching_slices(
            inserts in proptest::collection::vec((-500i64..500, 1i64..80), 0..60)
        ) {
            let mut set = SliceSet::new();
            for (start, len) in inserts {
                set.add_slice(TapeSlice::new(start, start + len));
            }
            let snap = set.snapshot();
            for pair in snap.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
        }

        /// cut then glue of the two parts reconstructs the original slice.
        #[test]
        fn prop_cut_glue_roundtrip(start in -200i64..200, len in 2i64..100, at in 1i64..99) {
            prop_assume!(at < len);
            let mut set = SliceSet::new();
            let original = TapeSlice::new(start, start + len);
            set.add_slice(original);

            set.cut(start + at);
            let parts = set.snapshot();
            prop_assert_eq!(parts.len(), 2);

            set.glue(parts[0], parts[1]);
            prop_assert_eq!(set.snapshot(), vec![original]);
        }
    }
}
