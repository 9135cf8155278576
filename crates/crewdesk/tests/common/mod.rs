//! Shared test utilities for crewdesk integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a scheduler to a temp-dir database and a fixed clock
//! - `NewJobBuilder` for assignment requests

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
