pub mod ack;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod interval;
pub mod job;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod scheduler;
pub mod store;

pub use ack::{AckOutcome, AcknowledgmentPolicy};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, CrewdeskError, NotifyError, Result, SchedulingError};
pub use job::{Job, JobPatch, JobStatus, NewJob};
pub use lifecycle::{EffectiveStatus, StatusCounts};
pub use notify::{BroadcastDispatcher, JobEvent, JobEventKind, NotificationDispatcher};
pub use scheduler::Scheduler;
pub use store::{JobStore, JobView};
