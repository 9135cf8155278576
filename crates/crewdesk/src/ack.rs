//! Per-assignee acknowledgment tracking.

use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;
use crate::job::{Job, JobStatus};
use crate::lifecycle;
use crate::store::JobStore;

/// When a job as a whole counts as acknowledged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgmentPolicy {
    /// The first assignee to acknowledge moves the job out of `Pending`.
    #[default]
    FirstAssignee,
    /// The job leaves `Pending` once every assignee has acknowledged.
    AllAssignees,
}

impl AcknowledgmentPolicy {
    fn satisfied_by(self, job: &Job) -> bool {
        match self {
            AcknowledgmentPolicy::FirstAssignee => !job.acknowledged_by.is_empty(),
            AcknowledgmentPolicy::AllAssignees => job.fully_acknowledged(),
        }
    }
}

/// What an acknowledgment did.
#[derive(Debug, Clone)]
pub struct AckOutcome {
    pub job: Job,
    /// The person was newly added to `acknowledged_by`.
    pub recorded: bool,
    /// The job moved `Pending → Acknowledged`.
    pub transitioned: bool,
}

/// Moves a `Pending` job to `Acknowledged` once `policy` is satisfied by
/// its recorded acknowledgments. Returns true if the status changed.
///
/// Runs after every acknowledgment and after edits, since dropping an
/// assignee can complete an `AllAssignees` job without a new acknowledgment.
pub(crate) fn settle(job: &mut Job, policy: AcknowledgmentPolicy) -> Result<bool, SchedulingError> {
    if job.status != JobStatus::Pending || !policy.satisfied_by(job) {
        return Ok(false);
    }
    lifecycle::check_transition(job, JobStatus::Acknowledged)?;
    job.status = JobStatus::Acknowledged;
    Ok(true)
}

/// Records that `person_id` acknowledged the job.
///
/// Repeating an acknowledgment records nothing. It still moves a `Pending`
/// job whose policy is already satisfied. Only assignees may acknowledge,
/// and terminal jobs refuse new acknowledgments.
pub fn acknowledge(
    store: &JobStore,
    job_id: &str,
    person_id: &str,
    policy: AcknowledgmentPolicy,
) -> Result<AckOutcome, SchedulingError> {
    let modified = store.modify(job_id, |_, job| {
        if !job.is_assignee(person_id) {
            return Err(SchedulingError::NotAssigned {
                job_id: job.id.clone(),
                person_id: person_id.to_string(),
            });
        }
        if job.has_acknowledged(person_id) {
            settle(job, policy)?;
            return Ok(());
        }
        if job.is_terminal() {
            return Err(SchedulingError::NotAcknowledgeable {
                job_id: job.id.clone(),
                status: job.status,
            });
        }

        job.acknowledged_by.insert(person_id.to_string());
        settle(job, policy)?;
        Ok(())
    })?;

    let recorded = !modified.before.has_acknowledged(person_id);
    let transitioned = modified.before.status != modified.after.status;
    if recorded || transitioned {
        log::info!(
            "{} acknowledged job {} ({}/{} assignees)",
            person_id,
            job_id,
            modified.after.acknowledged_by.len(),
            modified.after.assignees().count()
        );
    }

    Ok(AckOutcome {
        job: modified.after,
        recorded,
        transitioned,
    })
}

/// True if the person still owes an acknowledgment for this job.
pub fn needs_acknowledgment(job: &Job, person_id: &str) -> bool {
    job.is_assignee(person_id)
        && !job.has_acknowledged(person_id)
        && matches!(job.status, JobStatus::Pending | JobStatus::Acknowledged)
}

/// Worklist of jobs the person has not yet acknowledged.
pub fn pending_acknowledgments(store: &JobStore, person_id: &str) -> Vec<Job> {
    store.with_view(|view| {
        view.by_assignee(person_id)
            .into_iter()
            .filter(|job| needs_acknowledgment(job, person_id))
            .cloned()
            .collect()
    })
}
