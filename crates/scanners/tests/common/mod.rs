#![allow(dead_code)]

use async_trait::async_trait;
use bughunter_scanners::{
    Analysis, AnalysisError, Analyzer, ApiSet, BugCandidate, CodeUnit, Evidence, Judge, JudgeInput,
    Judgment, JudgmentError, RetrievalError, Retriever,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// Proposes the same candidates for every unit; units whose code contains
/// `PANIC` make it panic and units containing `CLEAN` get no candidates.
pub struct ScriptedAnalyzer {
    pub apis: Vec<String>,
    pub candidates: Vec<BugCandidate>,
    pub calls: AtomicU32,
}

impl ScriptedAnalyzer {
    pub fn new(candidate_lines: &[u32]) -> Self {
        Self {
            apis: vec!["rdi.dc().iClamp()".to_string(), "rdi.dc().iMeas()".to_string()],
            candidates: candidate_lines
                .iter()
                .map(|&line| BugCandidate::new(line, format!("line {}", line), "suspicious call"))
                .collect(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, unit: &CodeUnit) -> Result<Analysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if unit.code.contains("PANIC") {
            panic!("analyzer blew up on {}", unit.id);
        }
        if unit.code.contains("UNPARSEABLE") {
            return Err(AnalysisError::InvalidResponse("no CANDIDATES section".to_string()));
        }

        let candidates = if unit.code.contains("CLEAN") {
            Vec::new()
        } else {
            self.candidates.clone()
        };
        Ok(Analysis {
            apis: self.apis.iter().cloned().collect::<ApiSet>(),
            candidates,
            ..Analysis::default()
        })
    }
}

pub enum RetrievalMode {
    /// Two fresh snippets per call, plus one repeated snippet.
    Fresh,
    AlwaysFail,
}

pub struct ScriptedRetriever {
    mode: RetrievalMode,
    pub calls: AtomicU32,
    pub queries: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRetriever {
    pub fn new(mode: RetrievalMode) -> Self {
        Self {
            mode,
            calls: AtomicU32::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn retrieve(&self, queries: &[String]) -> Result<Vec<Evidence>, RetrievalError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.queries.lock().push(queries.to_vec());

        match self.mode {
            RetrievalMode::AlwaysFail => Err(RetrievalError::Transport("connection refused".to_string())),
            RetrievalMode::Fresh => Ok(vec![
                Evidence::new("q", "iClamp(low, high) sets the clamp window", 0.9),
                Evidence::new("q", format!("snippet {}a", call), 0.5),
                Evidence::new("q", format!("snippet {}b", call), 0.4),
            ]),
        }
    }
}

/// Replays a score script (the last score repeats) and records what it saw.
pub struct ScriptedJudge {
    scores: Vec<Result<f64, String>>,
    pub bug_lines: Vec<u32>,
    pub hints: Vec<String>,
    pub calls: AtomicU32,
    pub evidence_seen: Mutex<Vec<usize>>,
    cancel_during_call: Option<CancellationToken>,
}

impl ScriptedJudge {
    pub fn constant(score: f64) -> Self {
        Self::scripted(vec![Ok(score)])
    }

    pub fn scripted(scores: Vec<Result<f64, String>>) -> Self {
        Self {
            scores,
            bug_lines: vec![2],
            hints: vec!["iClamp parameter order".to_string()],
            calls: AtomicU32::new(0),
            evidence_seen: Mutex::new(Vec::new()),
            cancel_during_call: None,
        }
    }

    /// Cancels `token` while the first judgment is in progress.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_during_call = Some(token);
        self
    }

    pub fn with_bug_lines(mut self, lines: Vec<u32>) -> Self {
        self.bug_lines = lines;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn judge(&self, input: JudgeInput<'_>) -> Result<Judgment, JudgmentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.evidence_seen.lock().push(input.evidence.len());
        if let Some(token) = &self.cancel_during_call {
            token.cancel();
        }

        let step = self
            .scores
            .get(call)
            .or_else(|| self.scores.last())
            .cloned()
            .unwrap_or(Ok(0.0));

        match step {
            Ok(score) => Ok(Judgment {
                confidence: score,
                bug_lines: self.bug_lines.clone(),
                explanation: format!("round {} explanation", call + 1),
                hints: self.hints.clone(),
            }),
            Err(reason) => Err(JudgmentError::MissingScore(reason)),
        }
    }
}

pub fn unit(id: &str) -> CodeUnit {
    CodeUnit::new(id, "RDI_BEGIN();\nrdi.dc().iClamp(50 mA, -50 mA);\nrdi.dc().iMeas();\nRDI_END();")
        .with_context("Clamp then measure current")
}
