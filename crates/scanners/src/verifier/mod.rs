//! Verification loop
//!
//! The state machine at the heart of the pipeline. Each unit is analyzed once, then
//! alternates between documentation retrieval and judging until the judge's
//! confidence clears the threshold or the round budget is spent. The loop is the
//! single owner of that budget; adapters never retry on their own.

pub mod refine;
pub mod state;
pub mod verification_loop;

pub use refine::{merge_queries, QueryMergePolicy};
pub use state::{LoopState, LoopTrace, RoundRecord};
pub use verification_loop::{LoopSettings, VerificationLoop, VerificationOutcome};
