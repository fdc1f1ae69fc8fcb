//! Half-open interval arithmetic: overlap, clamp, merge and gap finding.
//!
//! All intervals are `[start, end)`. Zero-length intervals never overlap
//! anything, including themselves.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgendaError, Result};

/// A `[start, end)` span of time. Used for busy intervals and query windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Build an interval, rejecting `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(AgendaError::InvalidDuration(format!(
                "interval ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Fail with `InvalidDuration` unless this interval has positive length.
    pub(crate) fn ensure_window(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AgendaError::InvalidDuration(format!(
                "window [{}, {}) is empty",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// A free time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl FreeSlot {
    fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
        }
    }
}

/// True iff `a` and `b` share at least one instant.
///
/// Adjacent intervals (`a.end == b.start`) do not overlap.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Intersect `interval` with `window`. `None` when nothing remains.
pub fn clamp(interval: &Interval, window: &Interval) -> Option<Interval> {
    let start = interval.start.max(window.start);
    let end = interval.end.min(window.end);
    (start < end).then_some(Interval { start, end })
}

/// Merge overlapping or touching intervals.
///
/// Input must be sorted by start; output is sorted and non-overlapping with
/// a gap between every pair of neighbours.
pub fn merge(sorted: &[Interval]) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        if let Some(last) = merged.last_mut() {
            if interval.start <= last.end {
                last.end = last.end.max(interval.end);
                continue;
            }
        }
        merged.push(*interval);
    }
    merged
}

/// Gaps of at least `min_duration` inside `window` around the `merged` intervals.
///
/// Includes the leading gap before the first interval and the trailing gap
/// after the last one, both clamped to the window.
pub fn gaps(merged: &[Interval], window: &Interval, min_duration: Duration) -> Vec<FreeSlot> {
    let mut slots = Vec::new();
    let mut cursor = window.start;

    for busy in merged {
        let busy_start = busy.start.min(window.end);
        if cursor < busy_start && busy_start - cursor >= min_duration {
            slots.push(FreeSlot::between(cursor, busy_start));
        }
        cursor = cursor.max(busy.end);
        if cursor >= window.end {
            return slots;
        }
    }

    if cursor < window.end && window.end - cursor >= min_duration {
        slots.push(FreeSlot::between(cursor, window.end));
    }

    slots
}

