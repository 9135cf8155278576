//! Overlap tests over half-open `[start, end)` windows.

use chrono::{DateTime, Datelike, Utc};

use crate::error::SchedulingError;

/// Returns true if `[s1, e1)` and `[s2, e2)` share at least one instant.
///
/// Windows that merely touch (`e1 == s2`) do not overlap.
pub fn overlaps(s1: DateTime<Utc>, e1: DateTime<Utc>, s2: DateTime<Utc>, e2: DateTime<Utc>) -> bool {
    s1 < e2 && s2 < e1
}

/// Returns true if a job window intersects a query range `[range_start, range_end)`.
pub fn intersects_range(
    job_start: DateTime<Utc>,
    job_end: DateTime<Utc>,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> bool {
    overlaps(job_start, job_end, range_start, range_end)
}

/// Closed-window membership, `start <= t <= end`.
pub fn contains_instant(start: DateTime<Utc>, end: DateTime<Utc>, t: DateTime<Utc>) -> bool {
    start <= t && t <= end
}

/// Years whose RFC 3339 form is exactly four digits, so stored timestamps
/// compare as strings in time order.
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// Rejects empty and inverted windows, and windows outside the storable
/// years.
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if start >= end {
        return Err(SchedulingError::InvalidWindow { start, end });
    }
    if !STORABLE_YEARS.contains(&start.year()) || !STORABLE_YEARS.contains(&end.year()) {
        return Err(SchedulingError::WindowOutOfRange { start, end });
    }
    Ok(())
}
