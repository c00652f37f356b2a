use std::fmt;

use serde::{Deserialize, Serialize};

/// A character interval inside one structural node of a document.
///
/// Offsets are half-open: `[start_offset, end_offset)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionRange {
    /// Structural path of the text run both endpoints live in
    pub base_path: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl PositionRange {
    /// Build a range, returning `None` when `start > end`.
    #[must_use]
    pub fn new(
        base_path: impl Into<String>,
        start_offset: usize,
        end_offset: usize,
    ) -> Option<Self> {
        if start_offset > end_offset {
            return None;
        }
        Some(Self {
            base_path: base_path.into(),
            start_offset,
            end_offset,
        })
    }

    /// A zero-width range at `offset`.
    #[must_use]
    pub fn point(base_path: impl Into<String>, offset: usize) -> Self {
        Self {
            base_path: base_path.into(),
            start_offset: offset,
            end_offset: offset,
        }
    }

    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.start_offset == self.end_offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Ranges in different structural nodes are never comparable.
    #[must_use]
    pub fn is_comparable(&self, other: &PositionRange) -> bool {
        self.base_path == other.base_path
    }

    /// Strict half-open intersection: `a < d && c < b`.
    ///
    /// Touching ranges (`[0,5)` and `[5,10)`) do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &PositionRange) -> bool {
        self.is_comparable(other)
            && self.start_offset < other.end_offset
            && other.start_offset < self.end_offset
    }
}

impl fmt::Display for PositionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}..{}]",
            self.base_path, self.start_offset, self.end_offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(path: &str, start: usize, end: usize) -> PositionRange {
        PositionRange::new(path, start, end).unwrap()
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        let a = range("/4/2/1", 0, 5);
        let b = range("/4/2/1", 5, 10);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn crossing_ranges_overlap_both_ways() {
        let a = range("/4/2/1", 0, 6);
        let b = range("/4/2/1", 5, 10);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn containment_counts_as_overlap() {
        let outer = range("/4/2/1", 0, 11);
        let inner = range("/4/2/1", 5, 8);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn different_nodes_never_overlap() {
        let a = range("/4/2/1", 0, 10);
        let b = range("/4/4/1", 0, 10);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn zero_width_range_only_overlaps_strictly_inside() {
        let point = PositionRange::point("/4/2/1", 5);
        assert!(point.is_collapsed());
        assert!(point.overlaps(&range("/4/2/1", 0, 10)));
        assert!(!point.overlaps(&range("/4/2/1", 5, 10)));
        assert!(!point.overlaps(&range("/4/2/1", 0, 5)));
    }

    #[test]
    fn reversed_offsets_are_rejected() {
        assert!(PositionRange::new("/4", 8, 3).is_none());
    }
}
