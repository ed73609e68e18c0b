use super::refine::{merge_queries, QueryMergePolicy};
use super::state::{LoopState, LoopTrace, RoundRecord};
use crate::analyzer::{Analysis, Analyzer};
use crate::core::{
    AnalysisError, BugCandidate, CodeUnit, EvidenceSet, JudgmentError, RetrievalError, Verdict,
};
use crate::judge::{Judge, JudgeInput, Judgment};
use crate::retriever::Retriever;
use crate::runner::throttle::Throttle;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FALLBACK_LINES: usize = 3;

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub confidence_threshold: f64,
    pub max_retries: u32,
    pub merge_policy: QueryMergePolicy,
    pub call_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            max_retries: 3,
            merge_policy: QueryMergePolicy::default(),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl LoopSettings {
    /// Upper bound on retrieve/judge rounds per unit.
    pub fn max_rounds(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub trace: LoopTrace,
}

/// Highest-scoring judgment so far; ties keep the earlier round.
#[derive(Debug, Clone)]
struct BestRound {
    round: u32,
    confidence: f64,
    bug_lines: Vec<u32>,
    explanation: String,
}

/// Per-unit mutable state, owned by a single `run` call.
struct UnitState {
    analysis: Analysis,
    candidates: Vec<BugCandidate>,
    evidence: EvidenceSet,
    queries: Vec<String>,
    round: u32,
    best: Option<BestRound>,
    last_failure: Option<String>,
}

impl UnitState {
    fn fallback_lines(&self) -> Vec<u32> {
        self.candidates.iter().take(FALLBACK_LINES).map(|c| c.line).collect()
    }

    fn api_names(&self) -> Vec<String> {
        self.analysis.apis.iter().cloned().collect()
    }

    /// Writes the judge's score back onto the candidates it named.
    fn revise_candidates(&mut self, judgment: &Judgment) {
        for candidate in self
            .candidates
            .iter_mut()
            .filter(|c| judgment.bug_lines.contains(&c.line))
        {
            candidate.confidence = judgment.confidence;
            if !judgment.explanation.is_empty() {
                candidate.rationale = judgment.explanation.clone();
            }
        }
    }

    fn record_judgment(&mut self, judgment: &Judgment) {
        let better = self
            .best
            .as_ref()
            .map_or(true, |best| judgment.confidence > best.confidence);
        if better {
            let bug_lines = if judgment.bug_lines.is_empty() {
                self.fallback_lines()
            } else {
                judgment.bug_lines.clone()
            };
            self.best = Some(BestRound {
                round: self.round,
                confidence: judgment.confidence,
                bug_lines,
                explanation: judgment.explanation.clone(),
            });
        }
    }

    /// Verdict when the round budget runs out below the threshold.
    fn exhausted(&self, unit_id: &str) -> Verdict {
        match &self.best {
            Some(best) => Verdict::low_confidence(
                unit_id,
                best.bug_lines.clone(),
                best.explanation.clone(),
                best.confidence,
                self.round,
            ),
            None => {
                let explanation = self
                    .candidates
                    .iter()
                    .take(FALLBACK_LINES)
                    .map(|c| format!("Line {}: {}", c.line, c.rationale))
                    .collect::<Vec<_>>()
                    .join(" ");
                let confidence = self
                    .candidates
                    .iter()
                    .map(|c| c.confidence)
                    .fold(0.0, f64::max);
                Verdict::low_confidence(unit_id, self.fallback_lines(), explanation, confidence, self.round)
            }
        }
    }
}

/// Drives one code unit through analyze, retrieve and judge until a verdict.
///
/// The loop owns the only retry budget: collaborators make a single attempt per call
/// and any error they return is either fatal for the unit or costs one round.
/// Analyzer and judge calls take one throttle slot each; the retriever takes its own
/// slot per outbound query, so it shares the same `Throttle` instead.
pub struct VerificationLoop {
    analyzer: Arc<dyn Analyzer>,
    retriever: Arc<dyn Retriever>,
    judge: Arc<dyn Judge>,
    settings: LoopSettings,
    throttle: Arc<Throttle>,
}

impl VerificationLoop {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        retriever: Arc<dyn Retriever>,
        judge: Arc<dyn Judge>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            analyzer,
            retriever,
            judge,
            settings,
            throttle: Arc::new(Throttle::unlimited()),
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub async fn run(&self, unit: &CodeUnit, cancel: &CancellationToken) -> VerificationOutcome {
        let mut trace = LoopTrace::default();
        let mut state = LoopState::Analyzing;
        let mut unit_state: Option<UnitState> = None;

        let verdict = loop {
            trace.enter(state);

            if cancel.is_cancelled() {
                let rounds = unit_state.as_ref().map_or(0, |s| s.round);
                info!("Unit {} cancelled in state {}", unit.id, state);
                break Verdict::cancelled(&unit.id, rounds);
            }

            state = match (state, unit_state.as_mut()) {
                (LoopState::Analyzing, _) => {
                    trace.analyzer_calls += 1;
                    match self.analyze(unit).await {
                        Ok(analysis) if !analysis.has_candidates() => {
                            debug!("No candidates for {}", unit.id);
                            break Verdict::no_bug(&unit.id);
                        }
                        Ok(analysis) => {
                            let queries = if analysis.seed_queries.is_empty() {
                                analysis.apis.iter().cloned().collect()
                            } else {
                                analysis.seed_queries.clone()
                            };
                            unit_state = Some(UnitState {
                                candidates: analysis.candidates.clone(),
                                analysis,
                                evidence: EvidenceSet::new(),
                                queries,
                                round: 0,
                                best: None,
                                last_failure: None,
                            });
                            LoopState::Retrieving
                        }
                        Err(e) if e.is_fatal() => {
                            warn!("Fatal analysis error for {}: {}", unit.id, e);
                            break Verdict::error(&unit.id, e.to_string(), 0);
                        }
                        Err(e) => {
                            warn!("Analysis failed for {}: {}", unit.id, e);
                            break Verdict::inconclusive(&unit.id, e.to_string());
                        }
                    }
                }

                (LoopState::Retrieving, Some(s)) => {
                    s.round += 1;
                    trace.retrieval_calls += 1;
                    debug!("Unit {} round {} retrieving {} queries", unit.id, s.round, s.queries.len());

                    match self.retrieve(&s.queries).await {
                        Ok(batch) => {
                            let added = s.evidence.extend(batch);
                            debug!("Unit {} round {}: {} new snippets", unit.id, s.round, added);
                            LoopState::Judging
                        }
                        Err(e) if e.is_fatal() => {
                            warn!("Fatal retrieval error for {}: {}", unit.id, e);
                            break Verdict::error(&unit.id, e.to_string(), s.round);
                        }
                        Err(e) => {
                            warn!("Retrieval failed for {} in round {}: {}", unit.id, s.round, e);
                            trace.rounds.push(RoundRecord {
                                round: s.round,
                                queries: s.queries.clone(),
                                evidence_size: s.evidence.len(),
                                confidence: None,
                                failure: Some(e.to_string()),
                            });
                            s.last_failure = Some(e.to_string());
                            if s.round >= self.settings.max_rounds() {
                                break s.exhausted(&unit.id);
                            }
                            LoopState::Retrieving
                        }
                    }
                }

                (LoopState::Judging, Some(s)) => {
                    trace.judge_calls += 1;
                    let static_hints = s.analysis.static_report.render();
                    let result = self
                        .judge(JudgeInput {
                            unit,
                            candidates: &s.candidates,
                            evidence: s.evidence.as_slice(),
                            static_hints: &static_hints,
                        })
                        .await;

                    match result {
                        Ok(judgment) => {
                            trace.rounds.push(RoundRecord {
                                round: s.round,
                                queries: s.queries.clone(),
                                evidence_size: s.evidence.len(),
                                confidence: Some(judgment.confidence),
                                failure: None,
                            });
                            s.revise_candidates(&judgment);
                            s.record_judgment(&judgment);
                            s.last_failure = None;

                            if judgment.confidence >= self.settings.confidence_threshold {
                                let bug_lines = if judgment.bug_lines.is_empty() {
                                    s.fallback_lines()
                                } else {
                                    judgment.bug_lines.clone()
                                };
                                info!(
                                    "Unit {} confirmed in round {} with confidence {:.2}",
                                    unit.id, s.round, judgment.confidence
                                );
                                break Verdict::confirmed(
                                    &unit.id,
                                    bug_lines,
                                    judgment.explanation,
                                    judgment.confidence,
                                    s.round,
                                );
                            }

                            if s.round >= self.settings.max_rounds() {
                                break s.exhausted(&unit.id);
                            }
                            s.queries =
                                merge_queries(&s.api_names(), &judgment.hints, self.settings.merge_policy);
                            LoopState::Retrieving
                        }
                        Err(e) if e.is_fatal() => {
                            warn!("Fatal judgment error for {}: {}", unit.id, e);
                            break Verdict::error(&unit.id, e.to_string(), s.round);
                        }
                        Err(e) => {
                            warn!("Judgment failed for {} in round {}: {}", unit.id, s.round, e);
                            trace.rounds.push(RoundRecord {
                                round: s.round,
                                queries: s.queries.clone(),
                                evidence_size: s.evidence.len(),
                                confidence: None,
                                failure: Some(e.to_string()),
                            });
                            s.last_failure = Some(e.to_string());
                            if s.round >= self.settings.max_rounds() {
                                break s.exhausted(&unit.id);
                            }
                            LoopState::Retrieving
                        }
                    }
                }

                (LoopState::Reported, _) | (_, None) => {
                    break Verdict::error(&unit.id, "verification loop entered an invalid state", 0);
                }
            };
        };

        trace.enter(LoopState::Reported);
        if let Some(s) = unit_state.as_ref() {
            if let (Some(best), Some(failure)) = (s.best.as_ref(), s.last_failure.as_ref()) {
                debug!(
                    "Unit {} ended after a failed round ({}); best round was {}",
                    unit.id, failure, best.round
                );
            }
        }
        VerificationOutcome { verdict, trace }
    }

    async fn analyze(&self, unit: &CodeUnit) -> Result<Analysis, AnalysisError> {
        let timeout = self.settings.call_timeout;
        self.throttle.acquire().await;
        bounded(timeout, self.analyzer.analyze(unit))
            .await
            .unwrap_or(Err(AnalysisError::Timeout(timeout)))
    }

    async fn retrieve(&self, queries: &[String]) -> Result<Vec<crate::core::Evidence>, RetrievalError> {
        let timeout = self.settings.call_timeout;
        bounded(timeout, self.retriever.retrieve(queries))
            .await
            .unwrap_or(Err(RetrievalError::Timeout(timeout)))
    }

    async fn judge(&self, input: JudgeInput<'_>) -> Result<Judgment, JudgmentError> {
        let timeout = self.settings.call_timeout;
        self.throttle.acquire().await;
        bounded(timeout, self.judge.judge(input))
            .await
            .unwrap_or(Err(JudgmentError::Timeout(timeout)))
    }
}

/// `None` when the call outlived its timeout.
async fn bounded<T>(timeout: Duration, call: impl Future<Output = T>) -> Option<T> {
    tokio::time::timeout(timeout, call).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ApiSet, Evidence, VerdictStatus};
    use crate::llm::LLMError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct OneCandidate;

    #[async_trait]
    impl Analyzer for OneCandidate {
        async fn analyze(&self, _unit: &CodeUnit) -> Result<Analysis, AnalysisError> {
            Ok(Analysis {
                apis: ["iClamp"].into_iter().collect::<ApiSet>(),
                candidates: vec![BugCandidate::new(2, "rdi.dc().iClamp(5, -5);", "reversed")],
                ..Analysis::default()
            })
        }
    }

    struct StaticDocs;

    #[async_trait]
    impl Retriever for StaticDocs {
        async fn retrieve(&self, queries: &[String]) -> Result<Vec<Evidence>, RetrievalError> {
            Ok(queries
                .iter()
                .map(|q| Evidence::new(q, format!("doc for {}", q), 0.5))
                .collect())
        }
    }

    struct SlowJudge {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Judge for SlowJudge {
        async fn judge(&self, _input: JudgeInput<'_>) -> Result<Judgment, JudgmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(Judgment {
                confidence: 1.0,
                bug_lines: vec![2],
                explanation: String::new(),
                hints: Vec::new(),
            })
        }
    }

    struct UnauthorizedJudge;

    #[async_trait]
    impl Judge for UnauthorizedJudge {
        async fn judge(&self, _input: JudgeInput<'_>) -> Result<Judgment, JudgmentError> {
            Err(JudgmentError::Llm(LLMError::Authentication("invalid api key".into())))
        }
    }

    fn settings() -> LoopSettings {
        LoopSettings {
            call_timeout: Duration::from_secs(5),
            ..LoopSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_judge_timeout_consumes_rounds() {
        let judge = Arc::new(SlowJudge {
            calls: AtomicU32::new(0),
        });
        let verifier = VerificationLoop::new(
            Arc::new(OneCandidate),
            Arc::new(StaticDocs),
            judge.clone(),
            settings(),
        );

        let outcome = verifier
            .run(&CodeUnit::new("t1", "a\nb"), &CancellationToken::new())
            .await;

        assert_eq!(judge.calls.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.verdict.status(), VerdictStatus::LowConfidence);
        assert_eq!(outcome.verdict.bug_lines(), &[2]);
        assert_eq!(outcome.verdict.iterations(), 4);
        assert!(outcome.trace.rounds.iter().all(|r| r.failure.is_some()));
    }

    #[tokio::test]
    async fn test_fatal_judgment_is_error_verdict() {
        let verifier = VerificationLoop::new(
            Arc::new(OneCandidate),
            Arc::new(StaticDocs),
            Arc::new(UnauthorizedJudge),
            settings(),
        );

        let outcome = verifier
            .run(&CodeUnit::new("t2", "a\nb"), &CancellationToken::new())
            .await;

        assert_eq!(outcome.verdict.status(), VerdictStatus::Error);
        assert_eq!(outcome.trace.judge_calls, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let verifier = VerificationLoop::new(
            Arc::new(OneCandidate),
            Arc::new(StaticDocs),
            Arc::new(UnauthorizedJudge),
            settings(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = verifier.run(&CodeUnit::new("t3", "a"), &cancel).await;
        assert_eq!(outcome.verdict.status(), VerdictStatus::Cancelled);
        assert_eq!(outcome.trace.analyzer_calls, 0);
        assert_eq!(outcome.trace.states.last(), Some(&LoopState::Reported));
    }

    #[test]
    fn test_max_rounds() {
        assert_eq!(LoopSettings::default().max_rounds(), 4);
        let settings = LoopSettings {
            max_retries: 0,
            ..LoopSettings::default()
        };
        assert_eq!(settings.max_rounds(), 1);
    }
}
