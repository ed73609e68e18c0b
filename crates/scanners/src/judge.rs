//! LLM-backed judge scoring candidate lines against retrieved documentation
//!
//! One call evaluates every candidate of a unit together: RDI bugs are often spread
//! over several related lines (a pin renamed in one call and used in the next), and
//! the judge is asked to return the subset of lines it can back with evidence.

use crate::core::{BugCandidate, CodeUnit, Evidence, JudgmentError};
use crate::llm::prompts::VERIFIER_TEMPLATE;
use crate::llm::{JudgeResponse, LLMProvider, LLMRequest, PromptBuilder};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_CODE_CHARS: usize = 4000;
const MAX_CONTEXT_CHARS: usize = 1000;
const MAX_CANDIDATES: usize = 5;
const MAX_DOCS: usize = 5;
const MAX_DOC_CHARS: usize = 1200;
const MAX_DOCS_TOTAL_CHARS: usize = 6000;
const MAX_STATIC_CHARS: usize = 500;

/// Everything the judge sees in one round.
#[derive(Debug, Clone, Copy)]
pub struct JudgeInput<'a> {
    pub unit: &'a CodeUnit,
    pub candidates: &'a [BugCandidate],
    pub evidence: &'a [Evidence],
    pub static_hints: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub confidence: f64,
    pub bug_lines: Vec<u32>,
    pub explanation: String,
    pub hints: Vec<String>,
}

impl From<JudgeResponse> for Judgment {
    fn from(response: JudgeResponse) -> Self {
        Self {
            confidence: response.confidence.clamp(0.0, 1.0),
            bug_lines: response.bug_lines,
            explanation: response.explanation,
            hints: response.refined_queries,
        }
    }
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, input: JudgeInput<'_>) -> Result<Judgment, JudgmentError>;
}

pub struct LLMJudge {
    provider: Arc<dyn LLMProvider>,
    prompts: PromptBuilder,
    temperature: f32,
    max_tokens: u32,
}

impl LLMJudge {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::new(),
            temperature: 0.0,
            max_tokens: 2000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, input: &JudgeInput<'_>) -> Result<LLMRequest, JudgmentError> {
        let mut variables = HashMap::new();
        variables.insert(
            "numbered_code".to_string(),
            truncate(&input.unit.numbered_code(), MAX_CODE_CHARS),
        );
        variables.insert(
            "context".to_string(),
            truncate(input.unit.context_or_empty(), MAX_CONTEXT_CHARS),
        );
        variables.insert("candidates".to_string(), format_candidates(input.candidates));
        variables.insert("docs".to_string(), format_docs(input.evidence));
        variables.insert(
            "static_analysis".to_string(),
            truncate(input.static_hints, MAX_STATIC_CHARS),
        );

        let (system_prompt, user_prompt) = self.prompts.build_prompt(VERIFIER_TEMPLATE, &variables)?;
        Ok(LLMRequest {
            system_prompt,
            user_prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[async_trait]
impl Judge for LLMJudge {
    async fn judge(&self, input: JudgeInput<'_>) -> Result<Judgment, JudgmentError> {
        let request = self.build_request(&input)?;
        let response = self.provider.analyze(request).await?;
        let parsed = JudgeResponse::parse(&response.content).map_err(JudgmentError::MissingScore)?;
        Ok(parsed.into())
    }
}

fn format_candidates(candidates: &[BugCandidate]) -> String {
    if candidates.is_empty() {
        return "(none)".to_string();
    }
    candidates
        .iter()
        .take(MAX_CANDIDATES)
        .map(|c| format!("Line {}: {} | {}", c.line, c.content, c.rationale))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_docs(evidence: &[Evidence]) -> String {
    let mut ranked: Vec<&Evidence> = evidence.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut blocks: Vec<String> = Vec::new();
    let mut total = 0;
    for doc in ranked.into_iter().take(MAX_DOCS) {
        let label = doc.source.as_deref().unwrap_or(&doc.query);
        let block = format!("[{}]\n{}", label, truncate(doc.text.trim(), MAX_DOC_CHARS));
        let size = block.chars().count();
        if total + size > MAX_DOCS_TOTAL_CHARS {
            break;
        }
        total += size;
        blocks.push(block);
    }

    if blocks.is_empty() {
        "(no documentation retrieved)".to_string()
    } else {
        blocks.join("\n---\n")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
