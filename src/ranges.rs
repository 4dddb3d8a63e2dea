//! Interval algebra over one-dimensional numeric ranges.
//!
//! Observability constraints (target elevation, darkness, delay-line limits,
//! ...) are each expressed as a set of [`Range`]s in a common domain (decimal
//! hour angle or Julian date). These functions combine such sets into the
//! windows in which enough constraints hold at once.

use std::cmp::Ordering;

/// An inclusive interval `[min, max]`. `min <= max` is assumed, not checked.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Range {
        Range { min, max }
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    pub fn centre(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Is `value` inside this range, allowing `epsilon` of slack at either
    /// end?
    pub fn contains(&self, value: f64, epsilon: f64) -> bool {
        value >= self.min - epsilon && value <= self.max + epsilon
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// A sweep-line event: the start (`+1`) or end (`-1`) of an input range.
#[derive(Debug, Clone, Copy)]
struct RangeLimit {
    position: f64,
    flag: i8,
}

/// Get the index of the first range containing `value` (with `epsilon` of
/// tolerance at the range boundaries).
pub fn find(ranges: &[Range], value: f64, epsilon: f64) -> Option<usize> {
    ranges.iter().position(|r| r.contains(value, epsilon))
}

/// Is `value` inside any of the ranges?
pub fn contains(ranges: &[Range], value: f64, epsilon: f64) -> bool {
    find(ranges, value, epsilon).is_some()
}

/// Sort ranges ascending by their minimum, then their maximum.
pub fn sort_ranges(ranges: &mut [Range]) {
    ranges.sort_unstable_by(|a, b| a.min.total_cmp(&b.min).then(a.max.total_cmp(&b.max)));
}

/// Merge overlapping (or touching) ranges in place.
///
/// The input must already be sorted ascending by `min` (see [`sort_ranges`]);
/// this is not checked. Ranges are scanned from the end so that removal never
/// disturbs the part still to be visited; everything after index `i` is
/// already disjoint when `i` is visited.
pub fn union(ranges: &mut Vec<Range>) {
    if ranges.len() < 2 {
        return;
    }
    for i in (0..ranges.len() - 1).rev() {
        while i + 1 < ranges.len() && ranges[i].max >= ranges[i + 1].min {
            let next = ranges.remove(i + 1);
            ranges[i].max = ranges[i].max.max(next.max);
        }
    }
}

/// Clip every range to `[min, max]`. Ranges entirely outside are dropped.
/// Returns `None` if nothing survives.
pub fn restrict_range(ranges: &[Range], min: f64, max: f64) -> Option<Vec<Range>> {
    let restricted: Vec<Range> = ranges
        .iter()
        .filter(|r| r.max >= min && r.min <= max)
        .map(|r| match (r.min >= min, r.max <= max) {
            // Fully inside.
            (true, true) => *r,
            // Sticks out above.
            (true, false) => Range::new(r.min, max),
            // Sticks out below.
            (false, true) => Range::new(min, r.max),
            // Straddles both bounds.
            (false, false) => Range::new(min, max),
        })
        .collect();

    if restricted.is_empty() {
        None
    } else {
        Some(restricted)
    }
}

/// Find the maximal spans covered by at least `n_valid` of the input ranges.
///
/// Every input range contributes a start and an end event; events are swept
/// in ascending order while counting how many ranges are "open". A span
/// starts when the count reaches `n_valid` and ends when it drops below.
/// Zero-length spans are discarded. Each span is built with `factory(min,
/// max)`, so callers can produce their own range types.
///
/// If each constraint is supplied as a set of disjoint ranges, `n_valid`
/// equal to the number of constraints gives the windows where all of them
/// hold, and `n_valid = 1` gives their union.
///
/// The output is pairwise disjoint and ascending. `n_valid = 0` produces
/// nothing.
pub fn intersect_ranges<R, F>(ranges: &[Range], n_valid: usize, mut factory: F) -> Vec<R>
where
    F: FnMut(f64, f64) -> R,
{
    let mut results = vec![];
    if n_valid == 0 || ranges.is_empty() {
        return results;
    }

    let mut limits: Vec<RangeLimit> = ranges
        .iter()
        .flat_map(|r| {
            [
                RangeLimit {
                    position: r.min,
                    flag: 1,
                },
                RangeLimit {
                    position: r.max,
                    flag: -1,
                },
            ]
        })
        .collect();
    // Starts sort before ends at the same position; touching ranges then
    // count as covering their common point.
    limits.sort_unstable_by(|a, b| match a.position.total_cmp(&b.position) {
        Ordering::Equal => b.flag.cmp(&a.flag),
        o => o,
    });

    let n_valid = n_valid as i64;
    let mut count: i64 = 0;
    let mut start = None;
    for limit in &limits {
        let previous = count;
        count += i64::from(limit.flag);
        if previous < n_valid && count >= n_valid {
            start = Some(limit.position);
        } else if previous >= n_valid && count < n_valid {
            if let Some(start) = start.take() {
                if limit.position > start {
                    results.push(factory(start, limit.position));
                }
            }
        }
    }

    results
}

/// The summed length of all ranges.
pub fn total_length(ranges: &[Range]) -> f64 {
    ranges.iter().map(Range::length).sum()
}
