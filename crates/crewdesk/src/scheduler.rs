//! Caller-facing scheduling operations.
//!
//! [`Scheduler`] composes the store, the conflict detector, the lifecycle
//! engine and the acknowledgment tracker, and emits notification events
//! once a change has been committed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info_span, warn};

use crate::ack::{self, AcknowledgmentPolicy};
use crate::config::loader::validate_config;
use crate::config::Config;
use crate::db::Database;
use crate::error::{ConfigError, SchedulingError};
use crate::job::{Job, JobPatch, JobStatus, NewJob};
use crate::lifecycle::{self, EffectiveStatus, StatusCounts};
use crate::notify::{BroadcastDispatcher, JobEvent, NotificationDispatcher};
use crate::store::JobStore;

pub struct Scheduler {
    store: Arc<JobStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    /// Present when the scheduler owns its broadcast channel.
    broadcast: Option<BroadcastDispatcher>,
    policy: AcknowledgmentPolicy,
}

impl Scheduler {
    /// Production constructor: validates the config, opens the configured
    /// database, loads its jobs and wires a broadcast dispatcher.
    ///
    /// Logging is process-wide and is not installed here; call
    /// [`crate::logging::init`] with `config.logging` once at startup.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        validate_config(config)?;

        let db = if config.database.in_memory {
            Database::open_in_memory()?
        } else {
            let path = config
                .database
                .resolved_path()
                .ok_or_else(|| ConfigError::Validation {
                    message: "No database path configured".to_string(),
                })?;
            Database::open(&path)?
        };

        let store = JobStore::new();
        store.set_database(db);
        store.load_from_database()?;

        let broadcast = BroadcastDispatcher::new(config.notifications.channel_capacity);
        Ok(Self {
            store: Arc::new(store),
            dispatcher: Arc::new(broadcast.clone()),
            broadcast: Some(broadcast),
            policy: config.acknowledgment.policy,
        })
    }

    /// Constructor with injected collaborators.
    pub fn new(
        store: Arc<JobStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        policy: AcknowledgmentPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            broadcast: None,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn policy(&self) -> AcknowledgmentPolicy {
        self.policy
    }

    /// Subscribes to committed job events. Only available when the
    /// scheduler was built with [`Scheduler::from_config`].
    pub fn subscribe(&self) -> Option<broadcast::Receiver<JobEvent>> {
        self.broadcast.as_ref().map(BroadcastDispatcher::subscribe)
    }

    /// Creates a job, which the store refuses if the driver is already booked
    /// for an overlapping window, then tells every assignee.
    pub fn assign_job(&self, spec: NewJob) -> Result<Job, SchedulingError> {
        let _span = info_span!(
            "scheduler.assign_job",
            driver = spec.driver_id.as_deref().unwrap_or("none"),
            personnel = spec.personnel_ids.len(),
        )
        .entered();

        let job = self.store.create(spec)?;

        let targets: Vec<String> = job.assignees().map(str::to_string).collect();
        if !targets.is_empty() {
            self.notify(JobEvent::assigned(&job, targets, job.created_at));
        }
        Ok(job)
    }

    /// Records an assignee's acknowledgment. The scheduler is told when the
    /// job's status moves because of it.
    pub fn acknowledge_job(&self, job_id: &str, person_id: &str) -> Result<Job, SchedulingError> {
        let _span = info_span!("scheduler.acknowledge_job", job_id = %job_id).entered();

        let outcome = ack::acknowledge(&self.store, job_id, person_id, self.policy)?;
        if outcome.transitioned {
            self.notify(JobEvent::acknowledged(
                &outcome.job,
                person_id,
                outcome.job.updated_at,
            ));
        } else {
            debug!(
                job_id = %job_id,
                recorded = outcome.recorded,
                "Acknowledgment did not change job status"
            );
        }
        Ok(outcome.job)
    }

    pub fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<Job, SchedulingError> {
        let _span = info_span!("scheduler.update_job_status", job_id = %job_id, to = %status)
            .entered();
        lifecycle::transition(&self.store, job_id, status)
    }

    /// Edits a job. The store re-checks schedule or driver changes for
    /// driver conflicts against every other job. Newly added assignees are
    /// notified, and a `Pending` job whose remaining assignees have all
    /// acknowledged under the policy moves to `Acknowledged`.
    pub fn edit_job(&self, job_id: &str, patch: JobPatch) -> Result<Job, SchedulingError> {
        let _span = info_span!("scheduler.edit_job", job_id = %job_id).entered();

        let policy = self.policy;
        let modified = self.store.modify(job_id, |_, job| {
            job.apply_patch(patch);
            ack::settle(job, policy)?;
            Ok(())
        })?;

        let before: BTreeSet<&str> = modified.before.assignees().collect();
        let added: Vec<String> = modified
            .after
            .assignees()
            .filter(|p| !before.contains(p))
            .map(str::to_string)
            .collect();

        if !added.is_empty() && !modified.after.is_terminal() {
            self.notify(JobEvent::assigned(
                &modified.after,
                added,
                modified.after.updated_at,
            ));
        }

        if modified.before.status != modified.after.status {
            // Attributed to the first recorded acknowledger.
            if let Some(actor) = modified.after.acknowledged_by.iter().next() {
                self.notify(JobEvent::acknowledged(
                    &modified.after,
                    actor,
                    modified.after.updated_at,
                ));
            }
        }
        Ok(modified.after)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job, SchedulingError> {
        self.store.require(job_id)
    }

    /// Jobs where the person is personnel, driver or supervisor.
    pub fn get_jobs_by_user(&self, person_id: &str) -> Vec<Job> {
        self.store.query_by_assignee(person_id)
    }

    /// Jobs whose window intersects `[start, end)`.
    pub fn get_jobs_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Job> {
        self.store.query_by_date_range(start, end)
    }

    pub fn get_jobs_by_project(&self, project_id: &str) -> Vec<Job> {
        self.store.query_by_project(project_id)
    }

    /// Jobs still waiting on this person's acknowledgment.
    pub fn pending_acknowledgments(&self, person_id: &str) -> Vec<Job> {
        ack::pending_acknowledgments(&self.store, person_id)
    }

    /// Display status of a job at the store clock's current time.
    pub fn effective_status(&self, job_id: &str) -> Result<EffectiveStatus, SchedulingError> {
        let job = self.store.require(job_id)?;
        Ok(lifecycle::effective_status(&job, self.store.now()))
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.store.status_counts(self.store.now())
    }

    fn notify(&self, event: JobEvent) {
        if let Err(e) = self.dispatcher.dispatch(&event) {
            warn!(
                job_id = %event.job_id,
                kind = %event.kind,
                "Failed to dispatch notification: {}",
                e
            );
        }
    }
}
