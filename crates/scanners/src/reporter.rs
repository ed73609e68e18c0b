//! Final stage: verdict to output row
//!
//! Turns each `Verdict` into the three-column record written to the output CSV.
//! Model explanations are tidied up here (hedging and evidence quotes removed, long
//! multi-line answers compacted); every sentinel status has a fixed rendering.

use crate::core::{Verdict, VerdictStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const NO_BUG_LINE: &str = "None";
pub const NO_BUG_EXPLANATION: &str = "No bug found.";
pub const UNIDENTIFIED_LINE: &str = "Unable to identify";
pub const ERROR_LINE: &str = "ERROR";
pub const CANCELLED_LINE: &str = "CANCELLED";
pub const CANCELLED_EXPLANATION: &str = "Run cancelled before verification completed.";
pub const LOW_CONFIDENCE_PREFIX: &str = "(low confidence) ";
const DEFAULT_EXPLANATION: &str = "Bug detected in code.";

const COMPACT_THRESHOLD: usize = 200;
const MAX_SEGMENT_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Bug Line")]
    pub bug_line: String,

    #[serde(rename = "Explanation")]
    pub explanation: String,
}

impl OutputRow {
    pub fn new(id: impl Into<String>, bug_line: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bug_line: bug_line.into(),
            explanation: explanation.into(),
        }
    }
}

pub struct Reporter {
    /// Phrase pattern and replacement; `${1}` restores a trailing boundary the
    /// pattern had to consume.
    removals: Vec<(Regex, &'static str)>,
    whitespace: Regex,
    double_period: Regex,
    space_before_period: Regex,
    double_comma: Regex,
    line_marker: Regex,
    first_sentence: Regex,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        let re = |pattern: &str| Regex::new(pattern).unwrap_or_else(|e| panic!("{}: {}", pattern, e));
        let removals = [
            (r"(?is)Evidence:.*?(Line \d|$)", "${1}"),
            (r"(?is)CONTEXT (?:says|states|mentions|quote).*?(Line \d|\.|$)", "${1}"),
            (r"(?is)DOCS (?:state|mention|show).*?(Line \d|\.|$)", "${1}"),
            (r"(?is)Note:.*$", ""),
            (r"(?is)However,? without.*$", ""),
            (r"(?is)Further verification.*$", ""),
            (r"(?is)These potential.*$", ""),
            (r"(?is)It is essential to verify.*$", ""),
            (r"(?is)The exact allowed ranges.*$", ""),
            (r"(?is)This would need to be verified.*$", ""),
            (r"(?is)Additionally,?.*?(Line \d|\.|$)", "${1}"),
            (r"(?is)This implies that.*?(\.|$)", "${1}"),
            (r"(?is)which implies.*?(\.|$)", "${1}"),
            (r"(?is)The correct (?:code|answer|order).*?(\.|$)", "${1}"),
            (r"(?is)Therefore,?.*?(\.|$)", "${1}"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (re(pattern), replacement))
        .collect();

        Self {
            removals,
            whitespace: re(r"\s+"),
            double_period: re(r"\s*\.\s*\."),
            space_before_period: re(r"\s+\."),
            double_comma: re(r",\s*,"),
            line_marker: re(r"Line \d+:"),
            first_sentence: re(r"^(.*?[.!?])\s"),
        }
    }

    pub fn report(&self, verdict: &Verdict) -> OutputRow {
        let id = verdict.unit_id();
        match verdict.status() {
            VerdictStatus::Confirmed => OutputRow::new(
                id,
                format_bug_lines(verdict.bug_lines()),
                self.clean_explanation(verdict.explanation()),
            ),
            VerdictStatus::LowConfidence => OutputRow::new(
                id,
                format_bug_lines(verdict.bug_lines()),
                format!(
                    "{}{}",
                    LOW_CONFIDENCE_PREFIX,
                    self.clean_explanation(verdict.explanation())
                ),
            ),
            VerdictStatus::NoBug => OutputRow::new(id, NO_BUG_LINE, NO_BUG_EXPLANATION),
            VerdictStatus::Inconclusive => OutputRow::new(
                id,
                UNIDENTIFIED_LINE,
                format!("Analysis inconclusive: {}", verdict.explanation()),
            ),
            VerdictStatus::Error => OutputRow::new(
                id,
                ERROR_LINE,
                format!("Processing error: {}", verdict.explanation()),
            ),
            VerdictStatus::Cancelled => OutputRow::new(id, CANCELLED_LINE, CANCELLED_EXPLANATION),
        }
    }

    pub fn clean_explanation(&self, text: &str) -> String {
        let mut result = text.trim().to_string();
        for (pattern, replacement) in &self.removals {
            result = pattern.replace_all(&result, *replacement).into_owned();
        }

        result = self.whitespace.replace_all(&result, " ").trim().to_string();
        result = self.double_period.replace_all(&result, ".").into_owned();
        result = self.space_before_period.replace_all(&result, ".").into_owned();
        result = self.double_comma.replace_all(&result, ",").into_owned();

        if result.chars().count() > COMPACT_THRESHOLD {
            if let Some(compacted) = self.compact(&result) {
                result = compacted;
            }
        }

        let result = result.trim();
        if result.is_empty() {
            DEFAULT_EXPLANATION.to_string()
        } else {
            result.to_string()
        }
    }

    /// First sentence per `Line N:` segment, joined with ` | `.
    fn compact(&self, text: &str) -> Option<String> {
        let markers: Vec<_> = self.line_marker.find_iter(text).collect();
        if markers.is_empty() {
            return None;
        }

        let segments = markers.iter().enumerate().map(|(idx, marker)| {
            let body_end = markers.get(idx + 1).map_or(text.len(), |next| next.start());
            let segment = format!("{} {}", marker.as_str(), text[marker.end()..body_end].trim());
            let padded = format!("{} ", segment);
            match self.first_sentence.captures(&padded) {
                Some(caps) => caps[1].to_string(),
                None => segment.chars().take(MAX_SEGMENT_CHARS).collect(),
            }
        });

        Some(segments.collect::<Vec<_>>().join(" | "))
    }
}

/// Unique line numbers, comma-separated, in the order given.
pub fn format_bug_lines(lines: &[u32]) -> String {
    let mut unique: Vec<u32> = Vec::with_capacity(lines.len());
    for line in lines {
        if !unique.contains(line) {
            unique.push(*line);
        }
    }

    if unique.is_empty() {
        return UNIDENTIFIED_LINE.to_string();
    }
    unique
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
