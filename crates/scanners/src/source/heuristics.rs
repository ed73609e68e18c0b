//! RDI-specific pattern checks
//!
//! Regex passes over the raw snippet for mistakes the generic C++ linters cannot know
//! about: RDI lifecycle ordering, case-sensitive measurement method names, argument
//! order of clamps and documented value limits. Each hit becomes a hint in the
//! analyzer prompt and bumps the initial confidence of a candidate on the same line.

use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_FORCE_RANGE_VOLTS: u64 = 30;
const MAX_BURST_SAMPLES: u64 = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicIssue {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for HeuristicIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

pub struct RdiHeuristics {
    vec_edit_mode: Regex,
    iclamp: Regex,
    force_range: Regex,
    push_forward: Regex,
    imeas_any_case: Regex,
    imeas: Regex,
    vmeas_any_case: Regex,
    vmeas: Regex,
    imeas_range_any_case: Regex,
    imeas_range: Regex,
    imeans: Regex,
    vmeans: Regex,
    duplicate_end: Regex,
    duplicate_burst: Regex,
    samples: Regex,
}

impl Default for RdiHeuristics {
    fn default() -> Self {
        Self::new()
    }
}

impl RdiHeuristics {
    pub fn new() -> Self {
        // Patterns are literals; a failure here is a programming error caught by tests.
        let re = |pattern: &str| Regex::new(pattern).unwrap_or_else(|e| panic!("{}: {}", pattern, e));
        Self {
            vec_edit_mode: re(r"\.vecEditMode\s*\("),
            iclamp: re(r"\.iClamp\s*\(\s*([^,]+),\s*([^)]+)\)"),
            force_range: re(r"\.vForceRange\s*\(\s*(\d+)\s*(V|mV)?"),
            push_forward: re(r"push_forward"),
            imeas_any_case: re(r"(?i)\.imeas\s*\("),
            imeas: re(r"\.iMeas\s*\("),
            vmeas_any_case: re(r"(?i)\.vmeas\s*\("),
            vmeas: re(r"\.vMeas\s*\("),
            imeas_range_any_case: re(r"(?i)\.imeasrange\s*\("),
            imeas_range: re(r"\.iMeasRange\s*\("),
            imeans: re(r"(?i)\.imeans\s*\("),
            vmeans: re(r"(?i)\.vmeans\s*\("),
            duplicate_end: re(r"\.end\s*\(\s*\)\s*\.end\s*\("),
            duplicate_burst: re(r"\.burst\s*\([^)]*\)\s*\.burst\s*\("),
            samples: re(r"\.samples\s*\(\s*(\d+)\s*\)"),
        }
    }

    pub fn check(&self, code: &str) -> Vec<HeuristicIssue> {
        let mut issues = Vec::new();
        let mut begin_seen = false;

        for (idx, raw_line) in code.lines().enumerate() {
            let line = idx as u32 + 1;
            let stripped = raw_line.trim();
            let mut push = |message: String| issues.push(HeuristicIssue { line, message });

            if stripped.contains("RDI_BEGIN") {
                begin_seen = true;
            }
            if stripped.contains("RDI_END") && !begin_seen {
                push("RDI_END appears before RDI_BEGIN - wrong lifecycle order".to_string());
            }

            if self.vec_edit_mode.is_match(stripped) {
                push("vecEditMode call, verify mode parameter (TA::VECD or TA::VTT)".to_string());
            }

            if let Some(caps) = self.iclamp.captures(stripped) {
                let low = caps[1].trim();
                let high = caps[2].trim();
                if low.starts_with(|c: char| c.is_ascii_digit()) && high.starts_with('-') {
                    push(format!(
                        "iClamp({}, {}) - possible reversed (low, high) order",
                        low, high
                    ));
                }
            }

            if let Some(caps) = self.force_range.captures(stripped) {
                let value = caps[1].parse::<u64>().unwrap_or(u64::MAX);
                if value > MAX_FORCE_RANGE_VOLTS {
                    push(format!(
                        "vForceRange({}V) may exceed max allowed ({}V for typical cards)",
                        value, MAX_FORCE_RANGE_VOLTS
                    ));
                }
            }

            if self.push_forward.is_match(stripped) {
                push("push_forward is not a standard vector method, should be push_back".to_string());
            }

            if self.imeas_any_case.is_match(stripped) && !self.imeas.is_match(stripped) {
                push("Possible typo - 'imeas' should be 'iMeas' (case-sensitive)".to_string());
            }
            if self.vmeas_any_case.is_match(stripped) && !self.vmeas.is_match(stripped) {
                push("Possible typo - 'vmeas' should be 'vMeas' (case-sensitive)".to_string());
            }
            if self.imeas_range_any_case.is_match(stripped) && !self.imeas_range.is_match(stripped) {
                push("Possible typo - should be 'iMeasRange' (case-sensitive)".to_string());
            }
            if self.imeans.is_match(stripped) {
                push("'iMeans' is not valid, should be 'iMeas'".to_string());
            }
            if self.vmeans.is_match(stripped) {
                push("'vMeans' is not valid, should be 'vMeas'".to_string());
            }

            if self.duplicate_end.is_match(stripped) {
                push("Duplicate .end() call detected".to_string());
            }
            if self.duplicate_burst.is_match(stripped) {
                push("Duplicate .burst() call detected, should likely be .execute()".to_string());
            }

            if let Some(caps) = self.samples.captures(stripped) {
                let samples = caps[1].parse::<u64>().unwrap_or(u64::MAX);
                if samples > MAX_BURST_SAMPLES {
                    push(format!(
                        "samples({}) exceeds max {} for burst site upload",
                        samples, MAX_BURST_SAMPLES
                    ));
                }
            }
        }

        issues
    }
}
