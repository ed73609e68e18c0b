use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a unit currently is in the verification state machine.
///
/// `Analyzing -> Retrieving -> Judging -> (Retrieving | Reported)`; every failure,
/// cancellation and exhausted budget also ends in `Reported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Analyzing,
    Retrieving,
    Judging,
    Reported,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Reported)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Analyzing => write!(f, "analyzing"),
            LoopState::Retrieving => write!(f, "retrieving"),
            LoopState::Judging => write!(f, "judging"),
            LoopState::Reported => write!(f, "reported"),
        }
    }
}

/// What happened in one retrieve/judge round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub queries: Vec<String>,
    pub evidence_size: usize,
    pub confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Observable history of one unit's run through the loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopTrace {
    pub states: Vec<LoopState>,
    pub rounds: Vec<RoundRecord>,
    pub analyzer_calls: u32,
    pub retrieval_calls: u32,
    pub judge_calls: u32,
}

impl LoopTrace {
    pub fn enter(&mut self, state: LoopState) {
        self.states.push(state);
    }

    pub fn rounds_used(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Evidence set size after each round; never decreasing.
    pub fn evidence_sizes(&self) -> Vec<usize> {
        self.rounds.iter().map(|r| r.evidence_size).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_state() {
        assert!(LoopState::Reported.is_terminal());
        assert!(!LoopState::Judging.is_terminal());
        assert_eq!(LoopState::Retrieving.to_string(), "retrieving");
    }

    #[test]
    fn test_trace_bookkeeping() {
        let mut trace = LoopTrace::default();
        trace.enter(LoopState::Analyzing);
        trace.rounds.push(RoundRecord {
            round: 1,
            queries: vec!["iMeas".to_string()],
            evidence_size: 2,
            confidence: Some(0.4),
            failure: None,
        });

        assert_eq!(trace.states, vec![LoopState::Analyzing]);
        assert_eq!(trace.rounds_used(), 1);
        assert_eq!(trace.evidence_sizes(), vec![2]);
    }
}
