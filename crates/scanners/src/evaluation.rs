//! Offline scoring of predictions against labelled input
//!
//! The ground-truth bug lines of a unit are the line positions where its `Code`
//! and `Correct Code` differ. A prediction is a hit when it names at least one of
//! them and exact when it names precisely them.

use crate::core::CodeUnit;
use crate::io::InputRecord;
use crate::llm::schemas::extract_line_numbers;
use crate::reporter::OutputRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// 1-based positions (within the buggy code) whose trimmed text differs.
pub fn ground_truth_lines(code: &str, correct_code: &str) -> Vec<u32> {
    let buggy: Vec<&str> = code.lines().collect();
    let fixed: Vec<&str> = correct_code.lines().collect();

    (0..buggy.len())
        .filter(|&idx| fixed.get(idx).map(|l| l.trim()) != Some(buggy[idx].trim()))
        .map(|idx| idx as u32 + 1)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitScore {
    pub id: String,
    pub expected: Vec<u32>,
    pub predicted: Vec<u32>,
    pub hit: bool,
    pub exact: bool,
}

impl UnitScore {
    pub fn new(id: impl Into<String>, expected: Vec<u32>, predicted: Vec<u32>) -> Self {
        let expected_set: BTreeSet<u32> = expected.iter().copied().collect();
        let predicted_set: BTreeSet<u32> = predicted.iter().copied().collect();
        Self {
            id: id.into(),
            hit: !expected_set.is_disjoint(&predicted_set),
            exact: !expected_set.is_empty() && expected_set == predicted_set,
            expected,
            predicted,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scores: Vec<UnitScore>,
    pub skipped: usize,
}

impl EvaluationReport {
    pub fn evaluated(&self) -> usize {
        self.scores.len()
    }

    pub fn hits(&self) -> usize {
        self.scores.iter().filter(|s| s.hit).count()
    }

    pub fn exact(&self) -> usize {
        self.scores.iter().filter(|s| s.exact).count()
    }

    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits(), self.evaluated())
    }

    pub fn exact_rate(&self) -> f64 {
        ratio(self.exact(), self.evaluated())
    }

    pub fn misses(&self) -> impl Iterator<Item = &UnitScore> {
        self.scores.iter().filter(|s| !s.hit)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Scores every labelled unit. Units without `Correct Code`, without a differing
/// line, or malformed are skipped; a unit with no prediction row counts as a miss.
pub fn evaluate(records: &[InputRecord], predictions: &[OutputRow]) -> EvaluationReport {
    let predicted: HashMap<&str, &OutputRow> = predictions
        .iter()
        .map(|row| (row.id.trim(), row))
        .collect();

    let mut report = EvaluationReport::default();
    for record in records {
        let InputRecord::Unit(unit) = record else {
            report.skipped += 1;
            continue;
        };
        let Some(expected) = expected_lines(unit) else {
            report.skipped += 1;
            continue;
        };

        let lines = predicted
            .get(unit.id.as_str())
            .map(|row| extract_line_numbers(&row.bug_line))
            .unwrap_or_default();
        report.scores.push(UnitScore::new(unit.id.clone(), expected, lines));
    }
    report
}

fn expected_lines(unit: &CodeUnit) -> Option<Vec<u32>> {
    let correct = unit.ground_truth.as_ref()?.correct_code.as_deref()?;
    let lines = ground_truth_lines(&unit.code, correct);
    (!lines.is_empty()).then_some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GroundTruth;

    fn labelled(id: &str, code: &str, correct: &str) -> InputRecord {
        InputRecord::Unit(CodeUnit::new(id, code).with_ground_truth(GroundTruth {
            correct_code: Some(correct.to_string()),
            explanation: None,
        }))
    }

    #[test]
    fn test_ground_truth_lines() {
        let code = "RDI_BEGIN();\n  rdi.dc().iMeans();\nRDI_END();";
        let correct = "RDI_BEGIN();\nrdi.dc().iMeas();\nRDI_END();";
        assert_eq!(ground_truth_lines(code, correct), vec![2]);
        assert_eq!(ground_truth_lines("a\nb\nc", "a"), vec![2, 3]);
        assert!(ground_truth_lines("a\n  b", "a\nb").is_empty());
    }

    #[test]
    fn test_hit_and_exact() {
        assert!(UnitScore::new("1", vec![2, 3], vec![3]).hit);
        assert!(!UnitScore::new("1", vec![2, 3], vec![3]).exact);
        assert!(UnitScore::new("1", vec![2, 3], vec![3, 2]).exact);
        assert!(!UnitScore::new("1", vec![2], vec![]).hit);
    }

    #[test]
    fn test_evaluate_report() {
        let records = vec![
            labelled("1", "a\nb\nc", "a\nB\nc"),
            labelled("2", "a\nb", "a\nb2"),
            labelled("3", "a", "a"),
            InputRecord::Unit(CodeUnit::new("4", "x")),
            InputRecord::Malformed {
                id: "row-5".to_string(),
                reason: "missing Code".to_string(),
            },
            labelled("6", "x\ny", "x\nz"),
        ];
        let predictions = vec![
            OutputRow::new("1", "2", "ok"),
            OutputRow::new("2", "1", "wrong line"),
            OutputRow::new("6", "ERROR", "Processing error: x"),
        ];

        let report = evaluate(&records, &predictions);
        assert_eq!(report.evaluated(), 3);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.hits(), 1);
        assert_eq!(report.exact(), 1);
        assert!((report.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.misses().count(), 2);
    }
}
