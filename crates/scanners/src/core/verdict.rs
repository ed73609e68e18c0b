use serde::{Deserialize, Serialize};
use std::fmt;

/// How a unit's verification ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Judge confidence reached the threshold.
    Confirmed,
    /// Retries ran out below the threshold; best round reported.
    LowConfidence,
    /// The analyzer produced no candidates.
    NoBug,
    /// The analyzer failed; nothing to verify.
    Inconclusive,
    /// The batch was cancelled while the unit was in flight.
    Cancelled,
    /// Fatal condition for this unit only.
    Error,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::LowConfidence => write!(f, "low-confidence"),
            Self::NoBug => write!(f, "no-bug"),
            Self::Inconclusive => write!(f, "inconclusive"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Terminal result for one code unit. Built once by the verification loop and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    unit_id: String,
    status: VerdictStatus,
    bug_lines: Vec<u32>,
    explanation: String,
    confidence: f64,
    iterations: u32,
}

impl Verdict {
    fn build(
        unit_id: impl Into<String>,
        status: VerdictStatus,
        bug_lines: Vec<u32>,
        explanation: impl Into<String>,
        confidence: f64,
        iterations: u32,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            status,
            bug_lines,
            explanation: explanation.into(),
            confidence: confidence.clamp(0.0, 1.0),
            iterations,
        }
    }

    pub fn confirmed(
        unit_id: impl Into<String>,
        bug_lines: Vec<u32>,
        explanation: impl Into<String>,
        confidence: f64,
        iterations: u32,
    ) -> Self {
        Self::build(
            unit_id,
            VerdictStatus::Confirmed,
            bug_lines,
            explanation,
            confidence,
            iterations,
        )
    }

    pub fn low_confidence(
        unit_id: impl Into<String>,
        bug_lines: Vec<u32>,
        explanation: impl Into<String>,
        confidence: f64,
        iterations: u32,
    ) -> Self {
        Self::build(
            unit_id,
            VerdictStatus::LowConfidence,
            bug_lines,
            explanation,
            confidence,
            iterations,
        )
    }

    pub fn no_bug(unit_id: impl Into<String>) -> Self {
        Self::build(unit_id, VerdictStatus::NoBug, Vec::new(), "", 1.0, 0)
    }

    pub fn inconclusive(unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::build(unit_id, VerdictStatus::Inconclusive, Vec::new(), reason, 0.0, 0)
    }

    pub fn cancelled(unit_id: impl Into<String>, iterations: u32) -> Self {
        Self::build(unit_id, VerdictStatus::Cancelled, Vec::new(), "", 0.0, iterations)
    }

    pub fn error(unit_id: impl Into<String>, reason: impl Into<String>, iterations: u32) -> Self {
        Self::build(unit_id, VerdictStatus::Error, Vec::new(), reason, 0.0, iterations)
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn status(&self) -> VerdictStatus {
        self.status
    }

    pub fn bug_lines(&self) -> &[u32] {
        &self.bug_lines
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Judging rounds performed before termination.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn is_low_confidence(&self) -> bool {
        self.status == VerdictStatus::LowConfidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let verdict = Verdict::confirmed("7", vec![3], "wrong mode", 1.7, 1);
        assert_eq!(verdict.confidence(), 1.0);
        assert_eq!(verdict.status(), VerdictStatus::Confirmed);
    }

    #[test]
    fn test_sentinels_carry_no_lines() {
        assert!(Verdict::no_bug("1").bug_lines().is_empty());
        assert!(Verdict::cancelled("2", 1).bug_lines().is_empty());
        assert_eq!(Verdict::error("3", "bad row", 0).explanation(), "bad row");
        assert!(Verdict::low_confidence("4", vec![1], "x", 0.2, 4).is_low_confidence());
    }
}
