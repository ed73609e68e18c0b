//! First pipeline stage: static hints plus one LLM pass over the snippet
//!
//! Produces the API set that seeds documentation search and the candidate bug lines
//! the verification loop will try to ground.

use crate::core::{AnalysisError, ApiSet, BugCandidate, CodeUnit};
use crate::llm::prompts::ANALYZER_TEMPLATE;
use crate::llm::{AnalyzerResponse, LLMProvider, LLMRequest, PromptBuilder};
use crate::source::{methods_on_line, ApiCall, StaticAnalyzer, StaticReport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const MAX_API_QUERIES: usize = 8;
const MAX_CANDIDATES_FOR_QUERIES: usize = 5;
const METHODS_PER_CANDIDATE: usize = 2;
const LLM_CANDIDATE_CONFIDENCE: f64 = 0.5;
const CORROBORATED_CANDIDATE_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub apis: ApiSet,
    pub candidates: Vec<BugCandidate>,
    pub static_report: StaticReport,
    pub seed_queries: Vec<String>,
}

impl Analysis {
    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, unit: &CodeUnit) -> Result<Analysis, AnalysisError>;
}

pub struct LLMAnalyzer {
    provider: Arc<dyn LLMProvider>,
    prompts: PromptBuilder,
    static_analyzer: StaticAnalyzer,
    temperature: f32,
    max_tokens: u32,
}

impl LLMAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, static_analyzer: StaticAnalyzer) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::new(),
            static_analyzer,
            temperature: 0.0,
            max_tokens: 2000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, unit: &CodeUnit, report: &StaticReport) -> Result<LLMRequest, AnalysisError> {
        let mut variables = HashMap::new();
        variables.insert("code".to_string(), unit.numbered_code());
        variables.insert("context".to_string(), unit.context_or_empty().to_string());
        variables.insert("static_analysis".to_string(), report.render());

        let (system_prompt, user_prompt) = self.prompts.build_prompt(ANALYZER_TEMPLATE, &variables)?;
        Ok(LLMRequest {
            system_prompt,
            user_prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[async_trait]
impl Analyzer for LLMAnalyzer {
    async fn analyze(&self, unit: &CodeUnit) -> Result<Analysis, AnalysisError> {
        let static_report = self.static_analyzer.analyze(&unit.code).await;
        debug!(
            "Static analysis for {}: {} lint sections, {} heuristic hits, {} calls",
            unit.id,
            static_report.lint.len(),
            static_report.heuristics.len(),
            static_report.api_calls.len()
        );

        let request = self.build_request(unit, &static_report)?;
        let response = self.provider.analyze(request).await?;
        let parsed = AnalyzerResponse::parse(&response.content).map_err(AnalysisError::InvalidResponse)?;

        let mut apis: ApiSet = parsed.apis.into_iter().collect();
        if apis.is_empty() {
            apis.extend(static_report.api_calls.iter().map(|call| call.name.clone()));
        }

        let candidates = build_candidates(unit, parsed.candidates, &static_report);
        let seed_queries = seed_queries(&apis, &candidates, &static_report.api_calls);

        Ok(Analysis {
            apis,
            candidates,
            static_report,
            seed_queries,
        })
    }
}

/// Keeps in-range, first-seen lines; fills missing content from the source.
fn build_candidates(
    unit: &CodeUnit,
    lines: Vec<crate::llm::CandidateLine>,
    report: &StaticReport,
) -> Vec<BugCandidate> {
    let line_count = unit.line_count() as u32;
    let mut candidates: Vec<BugCandidate> = Vec::new();

    for candidate in lines {
        if candidate.line > line_count || candidates.iter().any(|c| c.line == candidate.line) {
            debug!("Dropping candidate line {} for {}", candidate.line, unit.id);
            continue;
        }

        let content = if candidate.content.is_empty() {
            unit.line(candidate.line).unwrap_or_default().trim().to_string()
        } else {
            candidate.content
        };
        let confidence = if report.flags_line(candidate.line) {
            CORROBORATED_CANDIDATE_CONFIDENCE
        } else {
            LLM_CANDIDATE_CONFIDENCE
        };

        candidates.push(
            BugCandidate::new(candidate.line, content, candidate.reason).with_confidence(confidence),
        );
    }
    candidates
}

/// Usage queries for the first APIs, then syntax queries for the methods called on
/// the leading candidate lines.
pub fn seed_queries(apis: &ApiSet, candidates: &[BugCandidate], calls: &[ApiCall]) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    let mut push = |query: String| {
        if !queries.contains(&query) {
            queries.push(query);
        }
    };

    for api in apis.iter().take(MAX_API_QUERIES) {
        push(format!("{} correct usage", api));
    }

    for candidate in candidates.iter().take(MAX_CANDIDATES_FOR_QUERIES) {
        let methods = methods_on_line(calls, candidate.line);
        for method in methods.iter().rev().take(METHODS_PER_CANDIDATE) {
            push(format!("rdi {} syntax parameters", method));
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLLMProvider;

    const CODE: &str = "void t() {\n  RDI_BEGIN();\n  rdi.dc().pin(\"VDD\").iMeans();\n  RDI_END();\n}";

    fn analyzer(provider: MockLLMProvider) -> LLMAnalyzer {
        LLMAnalyzer::new(Arc::new(provider), StaticAnalyzer::offline())
    }

    #[tokio::test]
    async fn test_analyze_builds_candidates_and_queries() {
        let provider = MockLLMProvider::new();
        provider.push_reply(Ok(
            "APIS:\nrdi.dc().iMeas()\n\nCANDIDATES:\n3|rdi.dc().pin(\"VDD\").iMeans();|iMeans should be iMeas\n4||lifecycle\n99|x|out of range\n3|dup|dup".to_string(),
        ));

        let unit = CodeUnit::new("u1", CODE).with_context("Measure current on VDD");
        let analysis = analyzer(provider).analyze(&unit).await.unwrap();

        assert_eq!(analysis.apis.as_slice(), ["rdi.dc().iMeas()"]);
        assert_eq!(analysis.candidates.len(), 2);
        assert_eq!(analysis.candidates[0].confidence, 0.6);
        assert_eq!(analysis.candidates[1].confidence, 0.5);
        assert_eq!(analysis.candidates[1].content, "RDI_END();");
        assert_eq!(analysis.seed_queries[0], "rdi.dc().iMeas() correct usage");
        assert!(analysis
            .seed_queries
            .contains(&"rdi iMeans syntax parameters".to_string()));
    }

    #[tokio::test]
    async fn test_apis_fall_back_to_extracted_calls() {
        let provider = MockLLMProvider::new().with_default("APIS:\n\nCANDIDATES:\n");
        let analysis = analyzer(provider)
            .analyze(&CodeUnit::new("u2", CODE))
            .await
            .unwrap();

        assert!(!analysis.has_candidates());
        assert!(analysis.apis.iter().any(|api| api == "iMeans"));
    }

    #[tokio::test]
    async fn test_unusable_response_and_llm_failure() {
        let provider = MockLLMProvider::new().with_default("I cannot help with that.");
        let err = analyzer(provider)
            .analyze(&CodeUnit::new("u3", CODE))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponse(_)));

        let err = analyzer(MockLLMProvider::failing())
            .analyze(&CodeUnit::new("u4", CODE))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Llm(_)));
    }

    #[test]
    fn test_seed_queries_are_bounded_and_unique() {
        let apis: ApiSet = (0..12).map(|i| format!("api{}", i)).collect();
        let candidates = vec![BugCandidate::new(1, "x", "y")];
        let calls = vec![
            ApiCall { name: "dc".into(), chain: "rdi.dc".into(), line: 1 },
            ApiCall { name: "pin".into(), chain: "rdi.dc().pin".into(), line: 1 },
            ApiCall { name: "vForce".into(), chain: "rdi.dc().pin().vForce".into(), line: 1 },
        ];

        let queries = seed_queries(&apis, &candidates, &calls);
        assert_eq!(queries.len(), 10);
        assert_eq!(queries[8], "rdi vForce syntax parameters");
        assert_eq!(queries[9], "rdi pin syntax parameters");
    }
}
