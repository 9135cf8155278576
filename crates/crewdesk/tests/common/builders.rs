//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use crewdesk::NewJob;

/// Returns 2026-03-02 at the given hour, UTC.
pub fn hour(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).unwrap()
}

/// Builder for creating `NewJob` instances.
pub struct NewJobBuilder {
    spec: NewJob,
}

impl NewJobBuilder {
    /// Create a new builder: a 09:00-11:00 job issued by `scheduler-1`.
    pub fn new() -> Self {
        Self {
            spec: NewJob {
                title: "Site survey".to_string(),
                nature_of_work: "Survey".to_string(),
                site_address: "12 Harbour Rd".to_string(),
                time_start: hour(9),
                time_end: hour(11),
                created_by: "scheduler-1".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.spec.title = title.to_string();
        self
    }

    /// Set the window by whole hours on the fixture day.
    pub fn hours(mut self, start: u32, end: u32) -> Self {
        self.spec.time_start = hour(start);
        self.spec.time_end = hour(end);
        self
    }

    pub fn window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.spec.time_start = start;
        self.spec.time_end = end;
        self
    }

    pub fn driver(mut self, driver_id: &str) -> Self {
        self.spec.driver_id = Some(driver_id.to_string());
        self
    }

    pub fn supervisor(mut self, supervisor_id: &str) -> Self {
        self.spec.supervisor_id = Some(supervisor_id.to_string());
        self
    }

    /// Add one member of personnel.
    pub fn person(mut self, person_id: &str) -> Self {
        self.spec.personnel_ids.push(person_id.to_string());
        self
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.spec.project_id = Some(project_id.to_string());
        self
    }

    pub fn created_by(mut self, scheduler_id: &str) -> Self {
        self.spec.created_by = scheduler_id.to_string();
        self
    }

    pub fn build(self) -> NewJob {
        self.spec
    }
}

impl Default for NewJobBuilder {
    fn default() -> Self {
        Self::new()
    }
}
