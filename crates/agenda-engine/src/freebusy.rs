//! Compute free time slots from busy intervals.
//!
//! Clips busy intervals to the window, sorts and merges them, then returns
//! the gaps that are at least the requested length.

use chrono::Duration;

use crate::error::{AgendaError, Result};
use crate::interval::{self, Interval};

pub use crate::interval::FreeSlot;

/// Merge busy intervals clipped to `window`.
///
/// Returns a sorted, non-overlapping list. Intervals entirely outside the
/// window and empty intervals are dropped.
pub fn merge_busy_periods(busy: &[Interval], window: &Interval) -> Vec<Interval> {
    let mut clipped: Vec<Interval> = busy
        .iter()
        .filter_map(|b| interval::clamp(b, window))
        .collect();

    // Sort by start time (then by end time for stability).
    clipped.sort_by_key(|i| (i.start, i.end));

    interval::merge(&clipped)
}

/// Find free slots of at least `min_duration` within `window`.
///
/// Busy intervals may overlap and arrive in any order. Slots come back sorted
/// by start and never overlap each other or any busy interval.
///
/// # Errors
/// `InvalidDuration` when `min_duration` is not positive or `window` is empty.
pub fn find_free_time(
    busy: &[Interval],
    window: &Interval,
    min_duration: Duration,
) -> Result<Vec<FreeSlot>> {
    validate_request(window, min_duration)?;

    let merged = merge_busy_periods(busy, window);
    Ok(interval::gaps(&merged, window, min_duration))
}

/// Find the earliest free slot of at least `min_duration` within `window`.
pub fn find_first_free_slot(
    busy: &[Interval],
    window: &Interval,
    min_duration: Duration,
) -> Result<Option<FreeSlot>> {
    Ok(find_free_time(busy, window, min_duration)?.into_iter().next())
}

/// Reject a non-positive minimum duration or an empty window.
pub(crate) fn validate_request(window: &Interval, min_duration: Duration) -> Result<()> {
    if min_duration <= Duration::zero() {
        return Err(AgendaError::InvalidDuration(format!(
            "minimum slot duration must be positive, got {} minutes",
            min_duration.num_minutes()
        )));
    }
    window.ensure_window()
}
