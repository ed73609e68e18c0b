use serde::{Deserialize, Serialize};

/// Offline-evaluation data attached to an input row. Never shown to the LLM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl GroundTruth {
    pub fn is_empty(&self) -> bool {
        self.correct_code.is_none() && self.explanation.is_none()
    }
}

/// One snippet of test code to hunt bugs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: String,
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<GroundTruth>,
}

impl CodeUnit {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            context: None,
            ground_truth: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    pub fn with_ground_truth(mut self, ground_truth: GroundTruth) -> Self {
        self.ground_truth = if ground_truth.is_empty() {
            None
        } else {
            Some(ground_truth)
        };
        self
    }

    pub fn context_or_empty(&self) -> &str {
        self.context.as_deref().unwrap_or("")
    }

    /// Source line by 1-based number.
    pub fn line(&self, number: u32) -> Option<&str> {
        if number == 0 {
            return None;
        }
        self.code.lines().nth(number as usize - 1)
    }

    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }

    /// Code with `N: ` prefixes, the form both LLM prompts reference.
    pub fn numbered_code(&self) -> String {
        self.code
            .lines()
            .enumerate()
            .map(|(idx, line)| format!("{}: {}", idx + 1, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A hypothesised bug line proposed by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugCandidate {
    pub line: u32,
    pub content: String,
    pub rationale: String,
    pub confidence: f64,
}

impl BugCandidate {
    pub fn new(line: u32, content: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            line,
            content: content.into(),
            rationale: rationale.into(),
            confidence: 0.5,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// A documentation snippet returned by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub query: String,
    pub text: String,
    pub score: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Evidence {
    pub fn new(query: impl Into<String>, text: impl Into<String>, score: f64) -> Self {
        Self {
            query: query.into(),
            text: text.into(),
            score,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Append-only union of every snippet retrieved for one unit.
///
/// Snippets with identical text are kept once; the set never shrinks.
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
    items: Vec<Evidence>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a retrieved batch and returns how many snippets were new.
    pub fn extend(&mut self, batch: Vec<Evidence>) -> usize {
        let before = self.items.len();
        for evidence in batch {
            if !self.items.iter().any(|e| e.text == evidence.text) {
                self.items.push(evidence);
            }
        }
        self.items.len() - before
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Evidence] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Evidence> {
        self.items.iter()
    }

    /// Highest-scoring snippets first.
    pub fn ranked(&self) -> Vec<&Evidence> {
        let mut ranked: Vec<&Evidence> = self.items.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

/// Ordered, de-duplicated set of API names pulled out of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSet {
    names: Vec<String>,
}

impl ApiSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || self.names.iter().any(|n| n == trimmed) {
            return false;
        }
        self.names.push(trimmed.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for ApiSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ApiSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for ApiSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}
