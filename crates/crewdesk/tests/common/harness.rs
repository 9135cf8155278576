//! Test harness for isolated scheduler tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::broadcast;

use crewdesk::{
    AcknowledgmentPolicy, BroadcastDispatcher, Database, FixedClock, JobEvent, JobStore, Scheduler,
};

use super::builders::hour;

/// A scheduler backed by a SQLite file in a temp directory, driven by a
/// fixed clock and broadcasting its events.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub clock: Arc<FixedClock>,
    pub dispatcher: BroadcastDispatcher,
    pub scheduler: Scheduler,
}

impl TestHarness {
    /// Create a harness with the default acknowledgment policy. The clock
    /// starts at 06:00 on the fixture day.
    pub fn new() -> Self {
        Self::with_policy(AcknowledgmentPolicy::FirstAssignee)
    }

    pub fn with_policy(policy: AcknowledgmentPolicy) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("crewdesk.db");
        let clock = Arc::new(FixedClock::new(hour(6)));
        let dispatcher = BroadcastDispatcher::new(64);

        let store = Self::open_store(&db_path, clock.clone());
        let scheduler = Scheduler::new(Arc::new(store), Arc::new(dispatcher.clone()), policy);

        Self {
            temp_dir,
            db_path,
            clock,
            dispatcher,
            scheduler,
        }
    }

    /// A second, independent store on the same database file, as another
    /// process would see it.
    pub fn second_store(&self) -> JobStore {
        Self::open_store(&self.db_path, self.clock.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.dispatcher.subscribe()
    }

    fn open_store(path: &std::path::Path, clock: Arc<FixedClock>) -> JobStore {
        let db = Database::open(path).expect("Failed to open database");
        let store = JobStore::with_clock(clock);
        store.set_database(db);
        store.load_from_database().expect("Failed to load jobs");
        store
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains every event currently buffered on the receiver.
pub fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
