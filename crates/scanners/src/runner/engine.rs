use crate::core::{Verdict, VerdictStatus};
use crate::io::InputRecord;
use crate::reporter::{OutputRow, Reporter};
use crate::verifier::{LoopTrace, VerificationLoop};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

pub struct BatchEngine {
    verifier: Arc<VerificationLoop>,
    reporter: Arc<Reporter>,
    parallelism: usize,
}

impl BatchEngine {
    pub fn new(verifier: VerificationLoop) -> Self {
        Self {
            verifier: Arc::new(verifier),
            reporter: Arc::new(Reporter::new()),
            parallelism: 4,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub async fn run(&self, records: Vec<InputRecord>, cancel: CancellationToken) -> BatchReport {
        self.run_with_progress(records, cancel, |_| {}).await
    }

    /// Processes every record, at most `parallelism` at a time, calling `on_result`
    /// as each unit finishes. Results come back in input order.
    pub async fn run_with_progress(
        &self,
        records: Vec<InputRecord>,
        cancel: CancellationToken,
        mut on_result: impl FnMut(&UnitResult),
    ) -> BatchReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            "Processing {} units with parallelism {}",
            records.len(),
            self.parallelism
        );

        let mut pending = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| {
                let verifier = self.verifier.clone();
                let cancel = cancel.clone();
                async move { (index, process_record(verifier, record, cancel).await) }
            })
            .buffer_unordered(self.parallelism);

        let mut results: Vec<(usize, UnitResult)> = Vec::new();
        while let Some((index, (verdict, trace))) = pending.next().await {
            let result = UnitResult {
                row: self.reporter.report(&verdict),
                verdict,
                trace,
            };
            on_result(&result);
            results.push((index, result));
        }
        results.sort_by_key(|(index, _)| *index);

        let results: Vec<UnitResult> = results.into_iter().map(|(_, result)| result).collect();
        let summary = RunSummary::from_results(&results, started_at, clock.elapsed());
        info!(
            "Batch finished: {} units, {} rounds, {} ms",
            summary.total, summary.total_rounds, summary.elapsed_ms
        );
        BatchReport { results, summary }
    }
}

/// Runs one record on its own task so a panic inside the unit stays inside it.
async fn process_record(
    verifier: Arc<VerificationLoop>,
    record: InputRecord,
    cancel: CancellationToken,
) -> (Verdict, Option<LoopTrace>) {
    let unit = match record {
        InputRecord::Unit(unit) => unit,
        InputRecord::Malformed { id, reason } => {
            error!("Malformed input record {}: {}", id, reason);
            return (Verdict::error(id, format!("malformed input record: {}", reason), 0), None);
        }
    };

    let id = unit.id.clone();
    let span = info_span!("unit", unit_id = %id);
    let handle = tokio::spawn(
        async move {
            let outcome = verifier.run(&unit, &cancel).await;
            info!(
                "Verdict {} after {} rounds",
                outcome.verdict.status(),
                outcome.verdict.iterations()
            );
            outcome
        }
        .instrument(span),
    );

    match handle.await {
        Ok(outcome) => (outcome.verdict, Some(outcome.trace)),
        Err(e) => {
            let reason = if e.is_panic() {
                "unit processing panicked".to_string()
            } else {
                format!("unit task failed: {}", e)
            };
            error!("Unit {}: {}", id, reason);
            (Verdict::error(id, reason, 0), None)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitResult {
    pub verdict: Verdict,
    pub row: OutputRow,
    pub trace: Option<LoopTrace>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub confirmed: usize,
    pub low_confidence: usize,
    pub no_bug: usize,
    pub inconclusive: usize,
    pub cancelled: usize,
    pub error: usize,
}

impl StatusCount {
    fn add(&mut self, status: VerdictStatus) {
        match status {
            VerdictStatus::Confirmed => self.confirmed += 1,
            VerdictStatus::LowConfidence => self.low_confidence += 1,
            VerdictStatus::NoBug => self.no_bug += 1,
            VerdictStatus::Inconclusive => self.inconclusive += 1,
            VerdictStatus::Cancelled => self.cancelled += 1,
            VerdictStatus::Error => self.error += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub total: usize,
    pub total_rounds: u32,
    pub counts: StatusCount,
}

impl RunSummary {
    fn from_results(results: &[UnitResult], started_at: DateTime<Utc>, elapsed: std::time::Duration) -> Self {
        let mut counts = StatusCount::default();
        let mut total_rounds = 0;
        for result in results {
            counts.add(result.verdict.status());
            total_rounds += result.verdict.iterations();
        }

        Self {
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            total: results.len(),
            total_rounds,
            counts,
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    results: Vec<UnitResult>,
    summary: RunSummary,
}

impl BatchReport {
    pub fn results(&self) -> &[UnitResult] {
        &self.results
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn rows(&self) -> Vec<OutputRow> {
        self.results.iter().map(|r| r.row.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.summary)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::from("# BugHunter Run\n\n");
        let count = &self.summary.counts;

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- Started: {}\n", self.summary.started_at.to_rfc3339()));
        md.push_str(&format!("- Units: {}\n", self.summary.total));
        md.push_str(&format!("- Judging rounds: {}\n", self.summary.total_rounds));
        md.push_str(&format!("- Elapsed: {} ms\n\n", self.summary.elapsed_ms));

        md.push_str("## Verdicts\n\n");
        md.push_str(&format!("- Confirmed: {}\n", count.confirmed));
        md.push_str(&format!("- Low confidence: {}\n", count.low_confidence));
        md.push_str(&format!("- No bug: {}\n", count.no_bug));
        md.push_str(&format!("- Inconclusive: {}\n", count.inconclusive));
        md.push_str(&format!("- Cancelled: {}\n", count.cancelled));
        md.push_str(&format!("- Error: {}\n", count.error));
        md
    }
}
