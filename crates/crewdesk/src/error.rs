use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum CrewdeskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures surfaced by the scheduling operations.
///
/// Every variant is returned before anything is written, so a rejected
/// operation never leaves a partially applied job behind.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Time window {start} - {end} falls outside years 0000-9999")]
    WindowOutOfRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Driver {driver_id} is already booked on job {conflicting_job_id} for an overlapping window")]
    DriverDoubleBooked {
        driver_id: String,
        conflicting_job_id: String,
    },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("{person_id} is not assigned to job {job_id}")]
    NotAssigned { job_id: String, person_id: String },

    #[error("Job {job_id} is {status} and can no longer be acknowledged")]
    NotAcknowledgeable { job_id: String, status: JobStatus },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    IllegalTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {job_id} was modified concurrently, reload and retry")]
    StaleWrite { job_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] crate::db::DatabaseError),
}

/// Errors reported by a notification dispatcher. Never fatal to the
/// operation that produced the event.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, CrewdeskError>;
