use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse confidence bands used by the LLM prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

impl Confidence {
    pub fn percentage(&self) -> u8 {
        match self {
            Self::High => 90,
            Self::Medium => 60,
            Self::Low => 30,
        }
    }

    pub fn to_score(&self) -> f64 {
        self.percentage() as f64 / 100.0
    }
}

impl From<f64> for Confidence {
    fn from(score: f64) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" | "med" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("Unknown confidence level: {}", other)),
        }
    }
}

/// Reads a judge-reported confidence into a score in `[0, 1]`.
///
/// Accepts band words, plain fractions and percentages (`85`, `85%`).
pub fn parse_score(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches(['.', ',']).trim();
    if cleaned.is_empty() {
        return None;
    }

    let first_word = cleaned.split_whitespace().next().unwrap_or(cleaned);
    if let Ok(level) = first_word.parse::<Confidence>() {
        return Some(level.to_score());
    }

    let (number, percent) = match first_word.strip_suffix('%') {
        Some(n) => (n, true),
        None => (first_word, false),
    };
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let score = if percent || (value > 1.0 && value <= 100.0) {
        value / 100.0
    } else {
        value
    };
    Some(score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_round_trip() {
        assert_eq!(Confidence::from(Confidence::High.to_score()), Confidence::High);
        assert_eq!(Confidence::from(0.55), Confidence::Medium);
        assert_eq!(Confidence::from(0.1), Confidence::Low);
    }

    #[test]
    fn test_parse_score_forms() {
        assert_eq!(parse_score("high"), Some(0.9));
        assert_eq!(parse_score("LOW"), Some(0.3));
        assert_eq!(parse_score("0.85"), Some(0.85));
        assert_eq!(parse_score("85%"), Some(0.85));
        assert_eq!(parse_score("70"), Some(0.7));
        assert_eq!(parse_score("1.0."), Some(1.0));
        assert_eq!(parse_score("unsure"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("-0.2"), None);
    }
}
