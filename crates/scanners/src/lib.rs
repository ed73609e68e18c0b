//! BugHunter Scanners - Bug Detection Pipeline for RDI Test Code
//!
//! This crate finds bugs in C++ semiconductor test snippets written against the RDI
//! API. Each snippet flows through four stages: an analyzer that combines static
//! hints with an LLM pass to propose candidate lines, a retriever that pulls vendor
//! documentation, a verification loop that has an LLM judge score the candidates
//! against that documentation, and a reporter that renders the final verdict.

pub mod analyzer;
pub mod config;
pub mod core;
pub mod evaluation;
pub mod factory;
pub mod io;
pub mod judge;
pub mod llm;
pub mod reporter;
pub mod retriever;
pub mod runner;
pub mod source;
pub mod verifier;

pub use analyzer::{Analysis, Analyzer, LLMAnalyzer};
pub use config::PipelineConfig;
pub use core::{
    AnalysisError, ApiSet, BugCandidate, CodeUnit, Confidence, CsvError, Evidence, EvidenceSet,
    GroundTruth, JudgmentError, RetrievalError, Verdict, VerdictStatus,
};
pub use evaluation::{evaluate, EvaluationReport, UnitScore};
pub use factory::PipelineFactory;
pub use io::InputRecord;
pub use judge::{Judge, JudgeInput, Judgment, LLMJudge};
pub use reporter::{OutputRow, Reporter};
pub use retriever::{DocServerRetriever, Retriever};
pub use runner::{BatchEngine, BatchReport, RunSummary, Throttle};
pub use verifier::{LoopSettings, LoopState, QueryMergePolicy, VerificationLoop, VerificationOutcome};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
