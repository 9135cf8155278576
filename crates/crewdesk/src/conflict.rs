//! Driver double-booking detection.

use chrono::{DateTime, Utc};

use crate::error::SchedulingError;
use crate::interval::overlaps;
use crate::job::Job;
use crate::store::{JobStore, JobView};

/// Returns the first live job that books `driver_id` for a window
/// overlapping `[start, end)`.
///
/// Jobs in a terminal status and the job named by `exclude_job_id` are
/// ignored. Which conflicting job is reported is unspecified.
pub fn find_driver_conflict<'a, I>(
    jobs: I,
    driver_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_job_id: Option<&str>,
) -> Option<&'a Job>
where
    I: IntoIterator<Item = &'a Job>,
{
    jobs.into_iter()
        .filter(|j| j.driver_id.as_deref() == Some(driver_id))
        .filter(|j| Some(j.id.as_str()) != exclude_job_id)
        .filter(|j| !j.is_terminal())
        .find(|j| overlaps(j.time_start, j.time_end, start, end))
}

/// True if committing `driver_id` to `[start, end)` would double-book them.
pub fn check_driver_conflict(
    store: &JobStore,
    driver_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_job_id: Option<&str>,
) -> bool {
    store.with_view(|view| {
        find_driver_conflict(view.by_assignee(driver_id), driver_id, start, end, exclude_job_id)
            .is_some()
    })
}

/// Guard form used on the write path: fails with `DriverDoubleBooked` if
/// `candidate` (a new or edited job) collides with another job's driver window.
pub fn ensure_no_driver_conflict(view: &JobView<'_>, candidate: &Job) -> Result<(), SchedulingError> {
    let driver_id = match candidate.driver_id.as_deref() {
        Some(d) if !candidate.is_terminal() => d,
        _ => return Ok(()),
    };

    match find_driver_conflict(
        view.by_assignee(driver_id),
        driver_id,
        candidate.time_start,
        candidate.time_end,
        Some(&candidate.id),
    ) {
        Some(other) => {
            log::warn!(
                "Rejected driver {} for job {}: already on job {}",
                driver_id,
                candidate.id,
                other.id
            );
            Err(SchedulingError::DriverDoubleBooked {
                driver_id: driver_id.to_string(),
                conflicting_job_id: other.id.clone(),
            })
        }
        None => Ok(()),
    }
}
