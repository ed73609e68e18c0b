//! Core data model shared by every pipeline stage
//!
//! A `CodeUnit` enters the pipeline, the analyzer turns it into `BugCandidate`s, the
//! retriever attaches `Evidence`, and the verification loop closes it with exactly one
//! `Verdict`. Stage errors live here too so adapters and the loop agree on which
//! failures consume a retry and which end the unit.

pub mod confidence;
pub mod error;
pub mod unit;
pub mod verdict;

pub use confidence::{parse_score, Confidence};
pub use error::{AnalysisError, CsvError, JudgmentError, RetrievalError};
pub use unit::{ApiSet, BugCandidate, CodeUnit, Evidence, EvidenceSet, GroundTruth};
pub use verdict::{Verdict, VerdictStatus};
