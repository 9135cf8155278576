//! Notification events and the dispatcher boundary.
//!
//! The scheduling core only produces [`JobEvent`]s after a change has been
//! committed. Delivery, retries and rendering belong to the dispatcher.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::NotifyError;
use crate::job::Job;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobEventKind {
    JobAssigned,
    AssignmentAcknowledged,
}

impl std::fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobEventKind::JobAssigned => write!(f, "Job assigned"),
            JobEventKind::AssignmentAcknowledged => write!(f, "Assignment acknowledged"),
        }
    }
}

/// Event record handed to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job_id: String,
    pub title: String,
    /// Who caused the event.
    pub actor_id: String,
    /// Who should hear about it.
    pub target_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Assignment notice from the scheduler to the given assignees.
    pub fn assigned(job: &Job, target_ids: Vec<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: JobEventKind::JobAssigned,
            job_id: job.id.clone(),
            title: job.title.clone(),
            actor_id: job.created_by.clone(),
            target_ids,
            supervisor_id: job.supervisor_id.clone(),
            timestamp,
        }
    }

    /// Acknowledgment notice from an assignee back to the scheduler.
    pub fn acknowledged(job: &Job, person_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: JobEventKind::AssignmentAcknowledged,
            job_id: job.id.clone(),
            title: job.title.clone(),
            actor_id: person_id.to_string(),
            target_ids: vec![job.created_by.clone()],
            supervisor_id: job.supervisor_id.clone(),
            timestamp,
        }
    }
}

/// Receives committed job events.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: &JobEvent) -> Result<(), NotifyError>;
}

/// Broadcasts job events to any number of in-process subscribers.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl BroadcastDispatcher {
    /// Creates a new dispatcher with the specified channel capacity.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Creates a new subscriber for job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

impl NotificationDispatcher for BroadcastDispatcher {
    fn dispatch(&self, event: &JobEvent) -> Result<(), NotifyError> {
        // No active receivers is fine
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
