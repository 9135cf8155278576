//! The job entity and the requests that create or edit it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Acknowledged,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Acknowledged,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    /// Completed and cancelled jobs never change again and hold no driver.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Acknowledged => "acknowledged",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Acknowledged => write!(f, "Acknowledged"),
            JobStatus::InProgress => write!(f, "In progress"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A scheduled unit of field work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nature_of_work: String,
    #[serde(default)]
    pub job_order_number: String,
    #[serde(default)]
    pub site_address: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    #[serde(default)]
    pub personnel_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub acknowledged_by: BTreeSet<String>,
    /// Scheduler who issued the assignment.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Job {
    /// Builds a fresh `Pending` job from an assignment request.
    pub(crate) fn from_new(id: String, spec: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: spec.title,
            description: spec.description,
            nature_of_work: spec.nature_of_work,
            job_order_number: spec.job_order_number,
            site_address: spec.site_address,
            time_start: spec.time_start,
            time_end: spec.time_end,
            supervisor_id: spec.supervisor_id,
            personnel_ids: dedup_preserving_order(spec.personnel_ids),
            driver_id: spec.driver_id,
            project_id: spec.project_id,
            status: JobStatus::Pending,
            acknowledged_by: BTreeSet::new(),
            created_by: spec.created_by,
            created_at: now,
            updated_at: now,
            color: spec.color,
        }
    }

    /// Personnel followed by the driver, if any.
    pub fn assignees(&self) -> impl Iterator<Item = &str> {
        self.personnel_ids
            .iter()
            .map(String::as_str)
            .chain(self.driver_id.as_deref())
    }

    pub fn is_assignee(&self, person_id: &str) -> bool {
        self.assignees().any(|p| p == person_id)
    }

    /// Assignee or supervisor.
    pub fn involves(&self, person_id: &str) -> bool {
        self.is_assignee(person_id) || self.supervisor_id.as_deref() == Some(person_id)
    }

    pub fn has_acknowledged(&self, person_id: &str) -> bool {
        self.acknowledged_by.contains(person_id)
    }

    /// True once every assignee is in `acknowledged_by`. A job without
    /// assignees is never fully acknowledged.
    pub fn fully_acknowledged(&self) -> bool {
        let mut assignees = self.assignees().peekable();
        assignees.peek().is_some() && assignees.all(|p| self.acknowledged_by.contains(p))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies an edit, dropping acknowledgments of anyone no longer assigned.
    pub(crate) fn apply_patch(&mut self, patch: JobPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(nature_of_work) = patch.nature_of_work {
            self.nature_of_work = nature_of_work;
        }
        if let Some(job_order_number) = patch.job_order_number {
            self.job_order_number = job_order_number;
        }
        if let Some(site_address) = patch.site_address {
            self.site_address = site_address;
        }
        if let Some(time_start) = patch.time_start {
            self.time_start = time_start;
        }
        if let Some(time_end) = patch.time_end {
            self.time_end = time_end;
        }
        if let Some(supervisor_id) = patch.supervisor_id {
            self.supervisor_id = supervisor_id;
        }
        if let Some(personnel_ids) = patch.personnel_ids {
            self.personnel_ids = dedup_preserving_order(personnel_ids);
        }
        if let Some(driver_id) = patch.driver_id {
            self.driver_id = driver_id;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }

        let assignees: BTreeSet<String> = self.assignees().map(str::to_string).collect();
        self.acknowledged_by.retain(|p| assignees.contains(p));
    }
}

/// An assignment request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nature_of_work: String,
    #[serde(default)]
    pub job_order_number: String,
    #[serde(default)]
    pub site_address: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    #[serde(default)]
    pub supervisor_id: Option<String>,
    #[serde(default)]
    pub personnel_ids: Vec<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A partial edit. `None` leaves a field alone; for optional references
/// `Some(None)` clears the field.
///
/// Status and acknowledgments are deliberately absent: those only change
/// through the lifecycle and acknowledgment operations.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub nature_of_work: Option<String>,
    pub job_order_number: Option<String>,
    pub site_address: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub supervisor_id: Option<Option<String>>,
    pub personnel_ids: Option<Vec<String>>,
    pub driver_id: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
