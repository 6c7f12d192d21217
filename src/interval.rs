//! Core interval type for coordinate tables.

/// A closed coordinate interval.
/// Uses 1-based, inclusive coordinates (GFF / BLAST convention).
///
/// Coordinates are signed so that a window expanded past position 1
/// keeps its true length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    /// Create a new interval.
    #[inline]
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Returns true if `end >= start`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.end >= self.start
    }

    /// Number of positions covered, 0 for an invalid interval.
    #[inline]
    pub fn len(&self) -> u64 {
        if self.is_valid() {
            self.end.abs_diff(self.start).saturating_add(1)
        } else {
            0
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.is_valid()
    }

    /// Check if this interval shares at least one position with another.
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        !(other.start > self.end || other.end < self.start)
    }

    /// Number of shared positions, 0 when disjoint.
    #[inline]
    pub fn overlap_length(&self, other: &Interval) -> u64 {
        if !self.overlaps(other) {
            return 0;
        }
        self.end
            .min(other.end)
            .abs_diff(self.start.max(other.start))
            .saturating_add(1)
    }

    /// Check if `other` lies entirely inside this interval.
    #[inline]
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Widen the interval by `flank` positions on both sides, saturating at
    /// the `i64` limits.
    #[inline]
    pub fn expand(&self, flank: i64) -> Interval {
        Interval {
            start: self.start.saturating_sub(flank),
            end: self.end.saturating_add(flank),
        }
    }

    /// Shift both ends left by `offset`.
    #[inline]
    pub fn shift_left(&self, offset: i64) -> Interval {
        Interval {
            start: self.start - offset,
            end: self.end - offset,
        }
    }
}
