//! Line-oriented response formats the analyzer and verifier prompts ask for.

use crate::core::confidence::parse_score;
use serde::{Deserialize, Serialize};

const APIS_MARKER: &str = "APIS:";
const CANDIDATES_MARKER: &str = "CANDIDATES:";
const CONFIDENCE_MARKER: &str = "CONFIDENCE:";
const EXPLANATION_MARKER: &str = "EXPLANATION:";
const HINT_MARKERS: [&str; 2] = ["REFINED_QUERIES:", "MISSING:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLine {
    pub line: u32,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerResponse {
    pub apis: Vec<String>,
    pub candidates: Vec<CandidateLine>,
}

impl AnalyzerResponse {
    /// Fails only when the reply has no `CANDIDATES:` section at all; a present
    /// but empty section is a legitimate "nothing found".
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = strip_fences(text);
        let Some(cand_start) = text.find(CANDIDATES_MARKER) else {
            return Err(format!("missing {} section", CANDIDATES_MARKER));
        };

        let apis = match text.find(APIS_MARKER) {
            Some(start) if start < cand_start => text[start + APIS_MARKER.len()..cand_start]
                .lines()
                .map(|l| strip_bullet(l).to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let candidates = text[cand_start + CANDIDATES_MARKER.len()..]
            .lines()
            .filter_map(parse_candidate_line)
            .collect();

        Ok(Self { apis, candidates })
    }
}

fn parse_candidate_line(line: &str) -> Option<CandidateLine> {
    let mut parts = line.trim().splitn(3, '|');
    let number = parts.next()?;
    let content = parts.next()?;
    let reason = parts.next()?;

    let digits: String = number
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let line = digits.parse::<u32>().ok().filter(|n| *n > 0)?;

    Some(CandidateLine {
        line,
        content: content.trim().to_string(),
        reason: reason.trim().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResponse {
    pub confidence: f64,
    pub bug_lines: Vec<u32>,
    pub explanation: String,
    pub refined_queries: Vec<String>,
}

impl JudgeResponse {
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = strip_fences(text);

        let mut confidence = None;
        let mut bug_lines = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(raw) = trimmed.strip_prefix(CONFIDENCE_MARKER) {
                confidence = Some(
                    parse_score(raw).ok_or_else(|| format!("unreadable confidence '{}'", raw.trim()))?,
                );
            } else if let Some(raw) = trimmed
                .strip_prefix("BUG_LINES:")
                .or_else(|| trimmed.strip_prefix("BUG_LINE:"))
            {
                bug_lines = extract_line_numbers(raw);
            }
        }
        let confidence = confidence.ok_or_else(|| format!("missing {} line", CONFIDENCE_MARKER))?;

        let hints_start = HINT_MARKERS
            .iter()
            .filter_map(|marker| text.find(marker).map(|idx| (idx, marker.len())))
            .min_by_key(|(idx, _)| *idx);

        let explanation = match text.find(EXPLANATION_MARKER) {
            Some(start) => {
                let body_start = start + EXPLANATION_MARKER.len();
                let body_end = match hints_start {
                    Some((idx, _)) if idx > body_start => idx,
                    _ => text.len(),
                };
                text[body_start..body_end].trim().to_string()
            }
            None => String::new(),
        };

        let refined_queries = match hints_start {
            Some((idx, len)) => text[idx + len..]
                .lines()
                .map(strip_bullet)
                .filter(|q| !q.is_empty() && !q.eq_ignore_ascii_case("none"))
                .filter(|q| !HINT_MARKERS.contains(q))
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            confidence,
            bug_lines,
            explanation,
            refined_queries,
        })
    }
}

/// Unique line numbers in first-seen order.
pub fn extract_line_numbers(raw: &str) -> Vec<u32> {
    let mut numbers = Vec::new();
    for token in raw.split(|c: char| !c.is_ascii_digit()) {
        if let Ok(n) = token.parse::<u32>() {
            if n > 0 && !numbers.contains(&n) {
                numbers.push(n);
            }
        }
    }
    numbers
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim();
    let without_dash = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed);

    match without_dash.split_once(". ") {
        Some((n, rest)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => rest.trim(),
        _ => without_dash.trim(),
    }
}
