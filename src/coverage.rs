//! Per-group coverage accumulators.
//!
//! Two strategies are provided:
//!
//! - [`BoundaryTracker`]: O(1) memory. Keeps only the running end of the
//!   collapsed track, which is enough when intervals arrive sorted by start.
//! - [`CoverageBitmap`]: O(length) memory. Marks every covered position so
//!   that overlap among unsorted, non-adjacent intervals is counted exactly.

use crate::interval::Interval;

/// One interval after clamping against the running track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collapsed {
    pub start: i64,
    pub end: i64,
    /// The original interval started before the running end.
    pub overlapped: bool,
}

impl Collapsed {
    /// True when the interval added nothing beyond the running end.
    #[inline]
    pub fn is_absorbed(&self) -> bool {
        self.end == self.start
    }

    /// Inclusive length, or 0 for an absorbed interval.
    #[inline]
    pub fn len(&self) -> u64 {
        if self.end > self.start {
            (self.end - self.start + 1) as u64
        } else {
            0
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A start that went backwards within one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderViolation {
    pub start: i64,
    pub previous_start: i64,
}

/// Running-maximum tracker for start-sorted intervals of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryTracker {
    previous_start: i64,
    previous_end: i64,
}

impl BoundaryTracker {
    /// Start a fresh track with the first interval of a group.
    pub fn open(first: Interval) -> (Self, Collapsed) {
        let tracker = Self {
            previous_start: first.start,
            previous_end: first.end,
        };
        let collapsed = Collapsed {
            start: first.start,
            end: first.end,
            overlapped: false,
        };
        (tracker, collapsed)
    }

    /// Clamp the next interval of the group against the running end.
    ///
    /// State is left untouched when the start order is violated.
    pub fn push(&mut self, interval: Interval) -> Result<Collapsed, OrderViolation> {
        if interval.start < self.previous_start {
            return Err(OrderViolation {
                start: interval.start,
                previous_start: self.previous_start,
            });
        }

        let collapsed = Collapsed {
            start: interval.start.max(self.previous_end),
            end: interval.end.max(self.previous_end),
            overlapped: interval.start < self.previous_end,
        };
        self.previous_start = interval.start;
        self.previous_end = collapsed.end;
        Ok(collapsed)
    }

    pub fn previous_end(&self) -> i64 {
        self.previous_end
    }
}

/// A position outside the declared sequence length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    pub position: i64,
    pub length: u64,
}

/// A declared length too large to hold in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationFailed {
    pub length: u64,
}

/// Exact per-position coverage for one sequence.
#[derive(Debug, Clone)]
pub struct CoverageBitmap {
    covered: Vec<bool>,
    covered_nt: u64,
    overlap_nt: u64,
    identity_nt: u64,
}

impl CoverageBitmap {
    /// Allocate a bitmap for a sequence of `length` positions.
    ///
    /// Fails instead of aborting when the length cannot be allocated.
    pub fn new(length: u64) -> Result<Self, AllocationFailed> {
        let failed = AllocationFailed { length };
        let slots = usize::try_from(length).map_err(|_| failed)?;
        let mut covered = Vec::new();
        covered.try_reserve_exact(slots).map_err(|_| failed)?;
        covered.resize(slots, false);
        Ok(Self {
            covered,
            covered_nt: 0,
            overlap_nt: 0,
            identity_nt: 0,
        })
    }

    /// Mark `span` (1-based inclusive) as covered.
    ///
    /// Newly covered positions add `floor(newly * percent_identity / 100)`
    /// identity-weighted positions; the floor is taken per call, before
    /// summation. An empty span contributes nothing. Returns the number of
    /// newly covered positions.
    pub fn add(&mut self, span: Interval, percent_identity: f64) -> Result<u64, OutOfRange> {
        if span.is_empty() {
            return Ok(0);
        }
        let length = self.declared_len();
        if span.start < 1 {
            return Err(OutOfRange {
                position: span.start,
                length,
            });
        }
        if span.end as u64 > length {
            return Err(OutOfRange {
                position: span.end,
                length,
            });
        }

        let mut newly = 0u64;
        for slot in &mut self.covered[(span.start - 1) as usize..span.end as usize] {
            if *slot {
                self.overlap_nt += 1;
            } else {
                *slot = true;
                newly += 1;
            }
        }
        self.covered_nt += newly;
        self.identity_nt += (newly as f64 * percent_identity / 100.0).floor() as u64;
        Ok(newly)
    }

    pub fn declared_len(&self) -> u64 {
        self.covered.len() as u64
    }

    pub fn covered_nt(&self) -> u64 {
        self.covered_nt
    }

    pub fn overlap_nt(&self) -> u64 {
        self.overlap_nt
    }

    pub fn identity_nt(&self) -> u64 {
        self.identity_nt
    }

    /// Covered fraction of the declared length; None for a zero length.
    pub fn coverage(&self) -> Option<f64> {
        ratio(self.covered_nt, self.declared_len())
    }

    /// Identity-weighted fraction of covered positions; None when nothing is covered.
    pub fn identity(&self) -> Option<f64> {
        ratio(self.identity_nt, self.covered_nt)
    }
}

#[inline]
fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}
