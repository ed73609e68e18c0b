//! Batch execution
//!
//! Runs the verification loop over every input record with bounded concurrency,
//! isolates each unit on its own task and aggregates verdicts into a run summary.
//! The throttle is the one piece of state the units share.

pub mod engine;
pub mod throttle;

pub use engine::{BatchEngine, BatchReport, RunSummary, StatusCount, UnitResult};
pub use throttle::Throttle;
