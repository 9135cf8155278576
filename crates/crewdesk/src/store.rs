//! Job store: the authoritative in-memory job collection, written through
//! to SQLite when a database is attached.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::clock::{Clock, SystemClock};
use crate::conflict;
use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::error::SchedulingError;
use crate::interval::{intersects_range, validate_window};
use crate::job::{Job, JobPatch, JobStatus, NewJob};
use crate::lifecycle::{self, StatusCounts};

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 with nanoseconds, so stored strings sort in time order.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt {
            id: job_id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}

fn parse_status(s: &str, job_id: &str) -> Result<JobStatus, DatabaseError> {
    JobStatus::parse(s).ok_or_else(|| DatabaseError::Corrupt {
        id: job_id.to_string(),
        reason: format!("unknown status '{}'", s),
    })
}

fn parse_id_list<T>(s: &str, job_id: &str) -> Result<T, DatabaseError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(s).map_err(|e| DatabaseError::Corrupt {
        id: job_id.to_string(),
        reason: format!("bad id list '{}': {}", s, e),
    })
}

fn job_to_row(job: &Job) -> JobRow {
    JobRow {
        id: job.id.clone(),
        title: job.title.clone(),
        description: job.description.clone(),
        nature_of_work: job.nature_of_work.clone(),
        job_order_number: job.job_order_number.clone(),
        site_address: job.site_address.clone(),
        time_start: format_timestamp(job.time_start),
        time_end: format_timestamp(job.time_end),
        supervisor_id: job.supervisor_id.clone(),
        personnel_ids: serde_json::to_string(&job.personnel_ids).unwrap_or_else(|_| "[]".into()),
        driver_id: job.driver_id.clone(),
        project_id: job.project_id.clone(),
        status: job.status.as_str().to_string(),
        acknowledged_by: serde_json::to_string(&job.acknowledged_by)
            .unwrap_or_else(|_| "[]".into()),
        created_by: job.created_by.clone(),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
        color: job.color.clone(),
    }
}

fn job_from_row(row: &JobRow) -> Result<Job, DatabaseError> {
    let personnel_ids: Vec<String> = parse_id_list(&row.personnel_ids, &row.id)?;
    let acknowledged_by: BTreeSet<String> = parse_id_list(&row.acknowledged_by, &row.id)?;

    Ok(Job {
        id: row.id.clone(),
        title: row.title.clone(),
        description: row.description.clone(),
        nature_of_work: row.nature_of_work.clone(),
        job_order_number: row.job_order_number.clone(),
        site_address: row.site_address.clone(),
        time_start: parse_timestamp(&row.time_start, &row.id)?,
        time_end: parse_timestamp(&row.time_end, &row.id)?,
        supervisor_id: row.supervisor_id.clone(),
        personnel_ids,
        driver_id: row.driver_id.clone(),
        project_id: row.project_id.clone(),
        status: parse_status(&row.status, &row.id)?,
        acknowledged_by,
        created_by: row.created_by.clone(),
        created_at: parse_timestamp(&row.created_at, &row.id)?,
        updated_at: parse_timestamp(&row.updated_at, &row.id)?,
        color: row.color.clone(),
    })
}

fn sort_by_window(jobs: &mut [&Job]) {
    jobs.sort_by(|a, b| (a.time_start, &a.id).cmp(&(b.time_start, &b.id)));
}

fn schedule_changed(before: &Job, after: &Job) -> bool {
    before.driver_id != after.driver_id
        || before.time_start != after.time_start
        || before.time_end != after.time_end
}

// ─── JobView ────────────────────────────────────────────────────────────────

/// Read-only view over the collection, handed to guards and closures that
/// run while the store holds its lock.
pub struct JobView<'a> {
    jobs: &'a HashMap<String, Job>,
}

impl<'a> JobView<'a> {
    fn new(jobs: &'a HashMap<String, Job>) -> Self {
        Self { jobs }
    }

    pub fn get(&self, id: &str) -> Option<&'a Job> {
        self.jobs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs where the person is personnel, driver or supervisor.
    pub fn by_assignee(&self, person_id: &str) -> Vec<&'a Job> {
        let mut jobs: Vec<&Job> = self.iter().filter(|j| j.involves(person_id)).collect();
        sort_by_window(&mut jobs);
        jobs
    }

    /// Jobs whose window intersects `[start, end)`. Empty or inverted ranges
    /// match nothing.
    pub fn by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&'a Job> {
        if start >= end {
            return Vec::new();
        }
        let mut jobs: Vec<&Job> = self
            .iter()
            .filter(|j| intersects_range(j.time_start, j.time_end, start, end))
            .collect();
        sort_by_window(&mut jobs);
        jobs
    }

    pub fn by_project(&self, project_id: &str) -> Vec<&'a Job> {
        let mut jobs: Vec<&Job> = self
            .iter()
            .filter(|j| j.project_id.as_deref() == Some(project_id))
            .collect();
        sort_by_window(&mut jobs);
        jobs
    }
}

/// Result of a read-modify-write.
#[derive(Debug, Clone)]
pub(crate) struct Modified {
    pub before: Job,
    pub after: Job,
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Authoritative job collection for the session.
///
/// Uses `std::sync::RwLock` for both the database handle and the collection.
/// Every write runs validation, the driver double-booking check, the caller's
/// guard, the database write and the in-memory commit while the collection's
/// write lock is held, so a check-then-write sequence cannot interleave with
/// another writer in this process. Across processes the SQLite transaction
/// repeats the driver check.
pub struct JobStore {
    /// Database handle (clone is cheap, inner `Arc`).
    db: RwLock<Option<Database>>,
    jobs: RwLock<HashMap<String, Job>>,
    clock: Arc<dyn Clock>,
}

impl JobStore {
    /// Creates an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            db: RwLock::new(None),
            jobs: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Sets the database connection.
    pub fn set_database(&self, db: Database) {
        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
    }

    /// Gets a cloned database handle if available.
    pub fn get_database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Runs `f` against a consistent snapshot of the collection.
    pub fn with_view<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&JobView<'_>) -> T,
    {
        let jobs = self.read_jobs();
        f(&JobView::new(&jobs))
    }

    /// Creates a `Pending` job with no acknowledgments.
    pub fn create(&self, spec: NewJob) -> Result<Job, SchedulingError> {
        self.create_guarded(spec, |_, _| Ok(()))
    }

    /// Creates a job, running `guard` against the current collection under
    /// the write lock first. A guard error aborts the creation, as does a
    /// driver already booked for an overlapping window.
    pub fn create_guarded<F>(&self, spec: NewJob, guard: F) -> Result<Job, SchedulingError>
    where
        F: FnOnce(&JobView<'_>, &Job) -> Result<(), SchedulingError>,
    {
        validate_window(spec.time_start, spec.time_end)?;

        let job = Job::from_new(uuid::Uuid::new_v4().to_string(), spec, self.now());

        let mut jobs = self.write_jobs();
        self.ensure_driver_free(&mut jobs, &job)?;
        guard(&JobView::new(&jobs), &job)?;

        if let Some(db) = self.get_database() {
            persist_new(&db, &job)?;
        }

        jobs.insert(job.id.clone(), job.clone());
        log::info!(
            "Created job {} '{}' ({} - {})",
            job.id,
            job.title,
            job.time_start,
            job.time_end
        );
        Ok(job)
    }

    /// Returns a job by ID.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.read_jobs().get(id).cloned()
    }

    /// Returns a job by ID or `NotFound`.
    pub fn require(&self, id: &str) -> Result<Job, SchedulingError> {
        self.get(id)
            .ok_or_else(|| SchedulingError::NotFound(id.to_string()))
    }

    /// Applies an edit and refreshes `updated_at`.
    ///
    /// A changed driver or window is checked for double-booking like any
    /// other write. Status legality and acknowledgment policy are left to
    /// the scheduling operations.
    pub fn update(&self, id: &str, patch: JobPatch) -> Result<Job, SchedulingError> {
        self.modify(id, |_, job| {
            job.apply_patch(patch);
            Ok(())
        })
        .map(|m| m.after)
    }

    /// Read-modify-write of one job under the write lock.
    ///
    /// `f` sees the collection as it was before the change and edits a copy
    /// of the job; nothing is committed if it fails. A change that leaves the
    /// job identical is not written and keeps its `updated_at`. A change to
    /// the driver or window must leave the driver free.
    pub(crate) fn modify<F>(&self, id: &str, f: F) -> Result<Modified, SchedulingError>
    where
        F: FnOnce(&JobView<'_>, &mut Job) -> Result<(), SchedulingError>,
    {
        let mut jobs = self.write_jobs();
        let before = jobs
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulingError::NotFound(id.to_string()))?;

        let mut after = before.clone();
        f(&JobView::new(&jobs), &mut after)?;
        validate_window(after.time_start, after.time_end)?;

        if after == before {
            return Ok(Modified { before, after });
        }
        if schedule_changed(&before, &after) {
            self.ensure_driver_free(&mut jobs, &after)?;
        }

        let now = self.now();
        after.updated_at = if now > before.updated_at {
            now
        } else {
            // Keep updated_at strictly increasing so it stays usable as a
            // compare-and-swap token even when the clock stands still.
            before.updated_at + Duration::nanoseconds(1)
        };

        if let Some(db) = self.get_database() {
            if let Err(e) = persist_update(&db, &before, &after) {
                if matches!(e, SchedulingError::StaleWrite { .. }) {
                    refresh_from_db(&db, &mut jobs, id);
                }
                return Err(e);
            }
        }

        jobs.insert(id.to_string(), after.clone());
        Ok(Modified { before, after })
    }

    /// Jobs where the person is personnel, driver or supervisor.
    pub fn query_by_assignee(&self, person_id: &str) -> Vec<Job> {
        self.with_view(|view| view.by_assignee(person_id).into_iter().cloned().collect())
    }

    /// Jobs whose window intersects `[start, end)`.
    pub fn query_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Job> {
        self.with_view(|view| view.by_date_range(start, end).into_iter().cloned().collect())
    }

    pub fn query_by_project(&self, project_id: &str) -> Vec<Job> {
        self.with_view(|view| view.by_project(project_id).into_iter().cloned().collect())
    }

    /// Returns all jobs ordered by window start.
    pub fn all(&self) -> Vec<Job> {
        self.with_view(|view| {
            let mut jobs: Vec<&Job> = view.iter().collect();
            sort_by_window(&mut jobs);
            jobs.into_iter().cloned().collect()
        })
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    /// Counts jobs by effective status at `now`.
    pub fn status_counts(&self, now: DateTime<Utc>) -> StatusCounts {
        self.with_view(|view| lifecycle::count_effective(view.iter(), now))
    }

    /// Loads every stored job into memory. Rows that fail to decode are
    /// skipped with a warning. Returns the number of jobs loaded.
    pub fn load_from_database(&self) -> Result<usize, DatabaseError> {
        let db = match self.get_database() {
            Some(db) => db,
            None => return Ok(0),
        };

        let rows = db.with_conn(job_repo::list_all)?;

        let mut loaded = 0;
        let mut jobs = self.write_jobs();
        for row in &rows {
            match job_from_row(row) {
                Ok(job) => {
                    jobs.insert(job.id.clone(), job);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping unreadable job row: {}", e),
            }
        }

        log::info!("Loaded {} jobs from database", loaded);
        Ok(loaded)
    }

    /// Rejects `job` if its driver is already booked for an overlapping
    /// window. With a database attached, a cached conflict is re-read first
    /// since another store may have moved or closed it.
    fn ensure_driver_free(
        &self,
        jobs: &mut HashMap<String, Job>,
        job: &Job,
    ) -> Result<(), SchedulingError> {
        let db = self.get_database();
        loop {
            let err = match conflict::ensure_no_driver_conflict(&JobView::new(jobs), job) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            let conflicting_id = match &err {
                SchedulingError::DriverDoubleBooked {
                    conflicting_job_id, ..
                } => Some(conflicting_job_id.clone()),
                _ => None,
            };
            let (Some(db), Some(conflicting_id)) = (db.as_ref(), conflicting_id) else {
                return Err(err);
            };

            let cached = jobs.get(&conflicting_id).cloned();
            refresh_from_db(db, jobs, &conflicting_id);
            // An unchanged row is a real conflict.
            if jobs.get(&conflicting_id) == cached.as_ref() {
                return Err(err);
            }
            log::debug!(
                "Job {} changed in the database, re-checking driver for {}",
                conflicting_id,
                job.id
            );
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Driver-window check repeated inside the write transaction. This is the
/// storage-level guarantee; the in-memory guard only sees this process.
fn check_driver_window(
    conn: &rusqlite::Connection,
    job: &Job,
) -> Result<(), SchedulingError> {
    let driver_id = match job.driver_id.as_deref() {
        Some(d) if !job.is_terminal() => d,
        _ => return Ok(()),
    };

    let conflict = job_repo::find_driver_conflict(
        conn,
        driver_id,
        &format_timestamp(job.time_start),
        &format_timestamp(job.time_end),
        Some(&job.id),
    )?;

    match conflict {
        Some(conflicting_job_id) => Err(SchedulingError::DriverDoubleBooked {
            driver_id: driver_id.to_string(),
            conflicting_job_id,
        }),
        None => Ok(()),
    }
}

fn persist_new(db: &Database, job: &Job) -> Result<(), SchedulingError> {
    db.with_write_txn(|tx| -> Result<(), SchedulingError> {
        check_driver_window(tx, job)?;
        job_repo::insert(tx, &job_to_row(job))?;
        Ok(())
    })
}

fn persist_update(db: &Database, before: &Job, after: &Job) -> Result<(), SchedulingError> {
    let recheck = schedule_changed(before, after);

    db.with_write_txn(|tx| -> Result<(), SchedulingError> {
        if recheck {
            check_driver_window(tx, after)?;
        }
        let expected = format_timestamp(before.updated_at);
        if !job_repo::update_if_unchanged(tx, &job_to_row(after), &expected)? {
            return Err(SchedulingError::StaleWrite {
                job_id: after.id.clone(),
            });
        }
        Ok(())
    })
}

/// Replaces a cached job with the stored row.
fn refresh_from_db(db: &Database, jobs: &mut HashMap<String, Job>, id: &str) {
    match db.with_conn(|conn| job_repo::find_by_id(conn, id)) {
        Ok(Some(row)) => match job_from_row(&row) {
            Ok(job) => {
                jobs.insert(job.id.clone(), job);
            }
            Err(e) => log::warn!("Could not refresh job {}: {}", id, e),
        },
        Ok(None) => log::warn!("Job {} vanished from the database", id),
        Err(e) => log::error!("Failed to refresh job {} from database: {}", id, e),
    }
}
