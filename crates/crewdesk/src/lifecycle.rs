//! Job status state machine and clock-derived display status.
//!
//! ```text
//! Pending ──► Acknowledged ──► InProgress ──► Completed
//!    │             │               │
//!    └─────────────┴───────────────┴────────► Cancelled
//! ```
//!
//! Every non-terminal state may also jump straight to `Completed`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SchedulingError;
use crate::interval::contains_instant;
use crate::job::{Job, JobStatus};
use crate::store::JobStore;

/// Returns true if `from → to` is an edge of the state machine.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;

    match (from, to) {
        (Pending, Acknowledged) => true,
        (Acknowledged, InProgress) => true,
        (Pending | Acknowledged | InProgress, Completed | Cancelled) => true,
        _ => false,
    }
}

/// Checks `job.status → to` and returns the error a caller should surface.
pub fn check_transition(job: &Job, to: JobStatus) -> Result<(), SchedulingError> {
    if can_transition(job.status, to) {
        Ok(())
    } else {
        Err(SchedulingError::IllegalTransition {
            job_id: job.id.clone(),
            from: job.status,
            to,
        })
    }
}

/// Moves a stored job to `to` if the edge exists.
///
/// `Acknowledged` is refused: only an assignee's acknowledgment may take
/// that edge, so it always comes with a recorded acknowledgment.
pub fn transition(store: &JobStore, job_id: &str, to: JobStatus) -> Result<Job, SchedulingError> {
    let modified = store.modify(job_id, |_, job| {
        if to == JobStatus::Acknowledged {
            return Err(SchedulingError::IllegalTransition {
                job_id: job.id.clone(),
                from: job.status,
                to,
            });
        }
        check_transition(job, to)?;
        job.status = to;
        Ok(())
    })?;

    log::info!(
        "Job {} moved {} -> {}",
        job_id,
        modified.before.status,
        modified.after.status
    );
    Ok(modified.after)
}

/// Display status derived from the stored status and the clock. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveStatus {
    pub status: JobStatus,
    /// True when the clock, not a stored transition, produced `status`.
    pub derived: bool,
}

impl EffectiveStatus {
    pub fn label(&self) -> &'static str {
        match (self.status, self.derived) {
            (JobStatus::Completed, true) => "Overdue",
            (JobStatus::Pending, _) => "Pending",
            (JobStatus::Acknowledged, _) => "Acknowledged",
            (JobStatus::InProgress, _) => "In progress",
            (JobStatus::Completed, false) => "Completed",
            (JobStatus::Cancelled, _) => "Cancelled",
        }
    }
}

/// Computes the status a job should be shown with at `now`.
///
/// Terminal statuses are shown as stored. Otherwise a job past its end reads
/// as completed, a job inside its window reads as in progress, and anything
/// else keeps its stored status.
pub fn effective_status(job: &Job, now: DateTime<Utc>) -> EffectiveStatus {
    if job.status.is_terminal() {
        return EffectiveStatus {
            status: job.status,
            derived: false,
        };
    }

    if now > job.time_end {
        EffectiveStatus {
            status: JobStatus::Completed,
            derived: true,
        }
    } else if contains_instant(job.time_start, job.time_end, now) {
        EffectiveStatus {
            status: JobStatus::InProgress,
            derived: job.status != JobStatus::InProgress,
        }
    } else {
        EffectiveStatus {
            status: job.status,
            derived: false,
        }
    }
}

/// Job counts per effective status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: usize,
    pub acknowledged: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Subset of `completed` reached only through the clock.
    pub overdue: usize,
    pub cancelled: usize,
}

pub fn count_effective<'a, I>(jobs: I, now: DateTime<Utc>) -> StatusCounts
where
    I: IntoIterator<Item = &'a Job>,
{
    let mut counts = StatusCounts::default();
    for job in jobs {
        let effective = effective_status(job, now);
        match effective.status {
            JobStatus::Pending => counts.pending += 1,
            JobStatus::Acknowledged => counts.acknowledged += 1,
            JobStatus::InProgress => counts.in_progress += 1,
            JobStatus::Completed => {
                counts.completed += 1;
                if effective.derived {
                    counts.overdue += 1;
                }
            }
            JobStatus::Cancelled => counts.cancelled += 1,
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::job::NewJob;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, 0).unwrap()
    }

    fn job_with_status(status: JobStatus) -> Job {
        let spec = NewJob {
            title: "Line repair".to_string(),
            time_start: at(9, 0),
            time_end: at(11, 0),
            created_by: "sched".to_string(),
            ..Default::default()
        };
        let mut job = Job::from_new("j".to_string(), spec, at(7, 0));
        job.status = status;
        job
    }

    #[test]
    fn test_transition_graph() {
        use JobStatus::*;

        let legal = [
            (Pending, Acknowledged),
            (Acknowledged, InProgress),
            (Pending, Completed),
            (Acknowledged, Completed),
            (InProgress, Completed),
            (Pending, Cancelled),
            (Acknowledged, Cancelled),
            (InProgress, Cancelled),
        ];

        for from in JobStatus::ALL {
            for to in JobStatus::ALL {
                assert_eq!(
                    can_transition(from, to),
                    legal.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in JobStatus::ALL {
            assert!(!can_transition(JobStatus::Completed, to));
            assert!(!can_transition(JobStatus::Cancelled, to));
        }
    }

    #[test]
    fn test_check_transition_reports_edge() {
        let job = job_with_status(JobStatus::Completed);
        match check_transition(&job, JobStatus::Pending) {
            Err(SchedulingError::IllegalTransition { from, to, .. }) => {
                assert_eq!(from, JobStatus::Completed);
                assert_eq!(to, JobStatus::Pending);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_transition_updates_store() {
        let store = JobStore::with_clock(Arc::new(FixedClock::new(at(7, 0))));
        let job = store
            .create(NewJob {
                title: "Line repair".to_string(),
                time_start: at(9, 0),
                time_end: at(11, 0),
                created_by: "sched".to_string(),
                ..Default::default()
            })
            .unwrap();

        let cancelled = transition(&store, &job.id, JobStatus::Cancelled).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        let err = transition(&store, &job.id, JobStatus::Pending).unwrap_err();
        assert!(matches!(err, SchedulingError::IllegalTransition { .. }));
        assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_transition_refuses_acknowledged_target() {
        let store = JobStore::with_clock(Arc::new(FixedClock::new(at(7, 0))));
        let job = store
            .create(NewJob {
                title: "Line repair".to_string(),
                time_start: at(9, 0),
                time_end: at(11, 0),
                personnel_ids: vec!["p1".to_string()],
                created_by: "sched".to_string(),
                ..Default::default()
            })
            .unwrap();

        let err = transition(&store, &job.id, JobStatus::Acknowledged).unwrap_err();
        match err {
            SchedulingError::IllegalTransition { from, to, .. } => {
                assert_eq!(from, JobStatus::Pending);
                assert_eq!(to, JobStatus::Acknowledged);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let stored = store.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.updated_at, job.updated_at);
        // The edge itself still exists for the acknowledgment tracker.
        assert!(can_transition(JobStatus::Pending, JobStatus::Acknowledged));
    }

    #[test]
    fn test_transition_unknown_job() {
        let store = JobStore::new();
        let err = transition(&store, "ghost", JobStatus::Completed).unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound(_)));
    }

    #[test]
    fn test_effective_status_before_window_keeps_stored() {
        let job = job_with_status(JobStatus::Acknowledged);
        let effective = effective_status(&job, at(8, 59));
        assert_eq!(effective.status, JobStatus::Acknowledged);
        assert!(!effective.derived);
    }

    #[test]
    fn test_effective_status_inside_window_is_in_progress() {
        let job = job_with_status(JobStatus::Pending);
        for now in [at(9, 0), at(10, 0), at(11, 0)] {
            let effective = effective_status(&job, now);
            assert_eq!(effective.status, JobStatus::InProgress);
            assert!(effective.derived);
        }

        let started = job_with_status(JobStatus::InProgress);
        assert!(!effective_status(&started, at(10, 0)).derived);
    }

    #[test]
    fn test_effective_status_after_window_is_overdue() {
        let job = job_with_status(JobStatus::Acknowledged);
        let effective = effective_status(&job, at(11, 1));
        assert_eq!(effective.status, JobStatus::Completed);
        assert_eq!(effective.label(), "Overdue");
    }

    #[test]
    fn test_effective_status_terminal_is_as_stored() {
        let cancelled = job_with_status(JobStatus::Cancelled);
        assert_eq!(
            effective_status(&cancelled, at(10, 0)).status,
            JobStatus::Cancelled
        );

        let completed = job_with_status(JobStatus::Completed);
        let effective = effective_status(&completed, at(12, 0));
        assert_eq!(effective.label(), "Completed");
    }

    #[test]
    fn test_effective_status_is_pure() {
        let job = job_with_status(JobStatus::Pending);
        let snapshot = job.clone();
        let first = effective_status(&job, at(10, 30));
        let second = effective_status(&job, at(10, 30));
        assert_eq!(first, second);
        assert_eq!(job, snapshot);
    }

    #[test]
    fn test_count_effective() {
        let jobs = vec![
            job_with_status(JobStatus::Pending),
            job_with_status(JobStatus::Acknowledged),
            job_with_status(JobStatus::Completed),
            job_with_status(JobStatus::Cancelled),
        ];

        let before = count_effective(&jobs, at(8, 0));
        assert_eq!(before.pending, 1);
        assert_eq!(before.acknowledged, 1);
        assert_eq!(before.completed, 1);
        assert_eq!(before.overdue, 0);
        assert_eq!(before.cancelled, 1);

        let after = count_effective(&jobs, at(12, 0));
        assert_eq!(after.completed, 3);
        assert_eq!(after.overdue, 2);
        assert_eq!(after.cancelled, 1);
    }
}
