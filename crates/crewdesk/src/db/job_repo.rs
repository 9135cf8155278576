//! Job repository: CRUD operations for the `jobs` table.
//!
//! Functions take a `Connection` so they can run either through
//! [`Database::with_conn`](super::Database::with_conn) or inside a write
//! transaction. Timestamps are fixed-width RFC 3339 strings, so SQL string
//! comparison orders them chronologically.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub nature_of_work: String,
    pub job_order_number: String,
    pub site_address: String,
    pub time_start: String,
    pub time_end: String,
    pub supervisor_id: Option<String>,
    /// JSON array of person ids.
    pub personnel_ids: String,
    pub driver_id: Option<String>,
    pub project_id: Option<String>,
    pub status: String,
    /// JSON array of person ids.
    pub acknowledged_by: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub color: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            nature_of_work: row.get("nature_of_work")?,
            job_order_number: row.get("job_order_number")?,
            site_address: row.get("site_address")?,
            time_start: row.get("time_start")?,
            time_end: row.get("time_end")?,
            supervisor_id: row.get("supervisor_id")?,
            personnel_ids: row.get("personnel_ids")?,
            driver_id: row.get("driver_id")?,
            project_id: row.get("project_id")?,
            status: row.get("status")?,
            acknowledged_by: row.get("acknowledged_by")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            color: row.get("color")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, title, description, nature_of_work, job_order_number,
         site_address, time_start, time_end, supervisor_id, personnel_ids, driver_id,
         project_id, status, acknowledged_by, created_by, created_at, updated_at, color)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            job.id,
            job.title,
            job.description,
            job.nature_of_work,
            job.job_order_number,
            job.site_address,
            job.time_start,
            job.time_end,
            job.supervisor_id,
            job.personnel_ids,
            job.driver_id,
            job.project_id,
            job.status,
            job.acknowledged_by,
            job.created_by,
            job.created_at,
            job.updated_at,
            job.color,
        ],
    )?;
    Ok(())
}

/// Overwrites every column except `id`, `created_by` and `created_at`, but
/// only if the stored `updated_at` still equals `expected_updated_at`.
///
/// Returns false when another writer got there first.
pub fn update_if_unchanged(
    conn: &Connection,
    job: &JobRow,
    expected_updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET title=?2, description=?3, nature_of_work=?4, job_order_number=?5,
         site_address=?6, time_start=?7, time_end=?8, supervisor_id=?9, personnel_ids=?10,
         driver_id=?11, project_id=?12, status=?13, acknowledged_by=?14, updated_at=?15,
         color=?16
         WHERE id=?1 AND updated_at=?17",
        params![
            job.id,
            job.title,
            job.description,
            job.nature_of_work,
            job.job_order_number,
            job.site_address,
            job.time_start,
            job.time_end,
            job.supervisor_id,
            job.personnel_ids,
            job.driver_id,
            job.project_id,
            job.status,
            job.acknowledged_by,
            job.updated_at,
            job.color,
            expected_updated_at,
        ],
    )?;
    Ok(changed == 1)
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
        .optional()?;
    Ok(row)
}

/// Returns the id of a non-terminal job that books `driver_id` for a window
/// overlapping `[start, end)`, ignoring `exclude_id`.
pub fn find_driver_conflict(
    conn: &Connection,
    driver_id: &str,
    start: &str,
    end: &str,
    exclude_id: Option<&str>,
) -> Result<Option<String>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT id FROM jobs
             WHERE driver_id = ?1
               AND status NOT IN ('completed', 'cancelled')
               AND time_start < ?3 AND ?2 < time_end
               AND (?4 IS NULL OR id != ?4)
             LIMIT 1",
            params![driver_id, start, end, exclude_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Every stored job, ordered by window start then id.
pub fn list_all(conn: &Connection) -> Result<Vec<JobRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY time_start ASC, id ASC")?;
    let rows = stmt
        .query_map([], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            title: "Meter replacement".to_string(),
            description: String::new(),
            nature_of_work: "maintenance".to_string(),
            job_order_number: "JO-0001".to_string(),
            site_address: "12 Harbour Rd".to_string(),
            time_start: "2026-01-01T09:00:00.000000000Z".to_string(),
            time_end: "2026-01-01T11:00:00.000000000Z".to_string(),
            supervisor_id: Some("sup-1".to_string()),
            personnel_ids: r#"["p1","p2"]"#.to_string(),
            driver_id: Some("d1".to_string()),
            project_id: Some("proj-a".to_string()),
            status: "pending".to_string(),
            acknowledged_by: "[]".to_string(),
            created_by: "sched-1".to_string(),
            created_at: "2025-12-30T08:00:00.000000000Z".to_string(),
            updated_at: "2025-12-30T08:00:00.000000000Z".to_string(),
            color: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let job = sample_job("job-1");
        db.with_conn(|conn| insert(conn, &job)).unwrap();

        let found = db.with_conn(|conn| find_by_id(conn, "job-1")).unwrap();
        assert_eq!(found, Some(job));
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        let found = db.with_conn(|conn| find_by_id(conn, "nonexistent")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_update_if_unchanged() {
        let db = test_db();
        let mut job = sample_job("job-2");
        db.with_conn(|conn| insert(conn, &job)).unwrap();

        let expected = job.updated_at.clone();
        job.status = "acknowledged".to_string();
        job.acknowledged_by = r#"["p1"]"#.to_string();
        job.updated_at = "2025-12-30T09:00:00.000000000Z".to_string();
        assert!(db
            .with_conn(|conn| update_if_unchanged(conn, &job, &expected))
            .unwrap());

        let found = db.with_conn(|conn| find_by_id(conn, "job-2")).unwrap().unwrap();
        assert_eq!(found.status, "acknowledged");
        assert_eq!(found.acknowledged_by, r#"["p1"]"#);

        // A second writer holding the old timestamp loses.
        job.status = "cancelled".to_string();
        assert!(!db
            .with_conn(|conn| update_if_unchanged(conn, &job, &expected))
            .unwrap());
        let found = db.with_conn(|conn| find_by_id(conn, "job-2")).unwrap().unwrap();
        assert_eq!(found.status, "acknowledged");
    }

    #[test]
    fn test_find_driver_conflict() {
        let db = test_db();
        db.with_conn(|conn| insert(conn, &sample_job("a"))).unwrap();

        let overlapping = db
            .with_conn(|conn| {
                find_driver_conflict(
                    conn,
                    "d1",
                    "2026-01-01T10:00:00.000000000Z",
                    "2026-01-01T12:00:00.000000000Z",
                    None,
                )
            })
            .unwrap();
        assert_eq!(overlapping.as_deref(), Some("a"));

        let abutting = db
            .with_conn(|conn| {
                find_driver_conflict(
                    conn,
                    "d1",
                    "2026-01-01T11:00:00.000000000Z",
                    "2026-01-01T12:00:00.000000000Z",
                    None,
                )
            })
            .unwrap();
        assert!(abutting.is_none());

        let excluded = db
            .with_conn(|conn| {
                find_driver_conflict(
                    conn,
                    "d1",
                    "2026-01-01T10:00:00.000000000Z",
                    "2026-01-01T12:00:00.000000000Z",
                    Some("a"),
                )
            })
            .unwrap();
        assert!(excluded.is_none());
    }

    #[test]
    fn test_find_driver_conflict_ignores_terminal_jobs() {
        let db = test_db();
        let mut cancelled = sample_job("c");
        cancelled.status = "cancelled".to_string();
        db.with_conn(|conn| insert(conn, &cancelled)).unwrap();

        let found = db
            .with_conn(|conn| {
                find_driver_conflict(
                    conn,
                    "d1",
                    "2026-01-01T09:30:00.000000000Z",
                    "2026-01-01T10:00:00.000000000Z",
                    None,
                )
            })
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_list_all_orders_by_window_then_id() {
        let db = test_db();
        let mut late = sample_job("late");
        late.time_start = "2026-01-02T09:00:00.000000000Z".to_string();
        late.time_end = "2026-01-02T10:00:00.000000000Z".to_string();
        db.with_conn(|conn| insert(conn, &late)).unwrap();
        db.with_conn(|conn| insert(conn, &sample_job("early-b"))).unwrap();
        let mut twin = sample_job("early-a");
        twin.driver_id = None;
        db.with_conn(|conn| insert(conn, &twin)).unwrap();

        let rows = db.with_conn(list_all).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["early-a", "early-b", "late"]);
    }

    #[test]
    fn test_list_all_empty() {
        let db = test_db();
        assert!(db.with_conn(list_all).unwrap().is_empty());
    }
}
