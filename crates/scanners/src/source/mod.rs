//! Static analysis of C++ RDI snippets
//!
//! Everything the pipeline learns about a snippet without asking a model: external
//! linter output, RDI-specific regex heuristics and the call sites tree-sitter finds.
//! The combined report is rendered into both prompts as hints and its flagged lines
//! raise the starting confidence of matching analyzer candidates.

pub mod api_extractor;
pub mod heuristics;
pub mod lint;

pub use api_extractor::{methods_on_line, ApiCall, CppApiExtractor};
pub use heuristics::{HeuristicIssue, RdiHeuristics};
pub use lint::{LintRunner, LintTool};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NO_ISSUES: &str = "No static analysis issues found.";
const HEURISTICS_LABEL: &str = "RDI-heuristics";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticReport {
    pub lint: Vec<(String, String)>,
    pub heuristics: Vec<HeuristicIssue>,
    pub api_calls: Vec<ApiCall>,
}

impl StaticReport {
    pub fn has_issues(&self) -> bool {
        !self.lint.is_empty() || !self.heuristics.is_empty()
    }

    pub fn flags_line(&self, line: u32) -> bool {
        self.heuristics.iter().any(|issue| issue.line == line)
    }

    /// `[tool]` sections separated by blank lines, heuristics last.
    pub fn render(&self) -> String {
        if !self.has_issues() {
            return NO_ISSUES.to_string();
        }

        let mut sections: Vec<String> = self
            .lint
            .iter()
            .map(|(tool, body)| format!("[{}]\n{}", tool, body))
            .collect();

        if !self.heuristics.is_empty() {
            let body = self
                .heuristics
                .iter()
                .map(|issue| issue.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("[{}]\n{}", HEURISTICS_LABEL, body));
        }
        sections.join("\n\n")
    }
}

pub struct StaticAnalyzer {
    lint: Option<LintRunner>,
    heuristics: RdiHeuristics,
    extractor: CppApiExtractor,
}

impl StaticAnalyzer {
    pub fn new(lint: Option<LintRunner>) -> Self {
        Self {
            lint,
            heuristics: RdiHeuristics::new(),
            extractor: CppApiExtractor::new(),
        }
    }

    /// Heuristics and call extraction only; no external processes.
    pub fn offline() -> Self {
        Self::new(None)
    }

    pub async fn analyze(&self, code: &str) -> StaticReport {
        let lint = match &self.lint {
            Some(runner) => runner
                .run_all(code)
                .await
                .into_iter()
                .map(|(tool, output)| (tool.to_string(), output))
                .collect(),
            None => Vec::new(),
        };

        let api_calls = self.extractor.extract(code).unwrap_or_else(|e| {
            debug!("API extraction failed: {}", e);
            Vec::new()
        });

        StaticReport {
            lint,
            heuristics: self.heuristics.check(code),
            api_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_issues() {
        assert_eq!(StaticReport::default().render(), NO_ISSUES);
    }

    #[test]
    fn test_render_sections() {
        let report = StaticReport {
            lint: vec![("cppcheck".to_string(), "snippet.cpp:2: style".to_string())],
            heuristics: vec![HeuristicIssue {
                line: 3,
                message: "'iMeans' is not valid, should be 'iMeas'".to_string(),
            }],
            api_calls: Vec::new(),
        };

        let rendered = report.render();
        assert!(rendered.starts_with("[cppcheck]\nsnippet.cpp:2: style\n\n[RDI-heuristics]\n"));
        assert!(rendered.contains("Line 3: 'iMeans'"));
        assert!(report.flags_line(3));
        assert!(!report.flags_line(2));
    }

    #[tokio::test]
    async fn test_offline_analyzer() {
        let code = "void t() {\n  RDI_BEGIN();\n  rdi.dc().pin(\"VDD\").iMeans();\n  RDI_END();\n}";
        let report = StaticAnalyzer::offline().analyze(code).await;

        assert!(report.lint.is_empty());
        assert!(report.flags_line(3));
        assert!(report.api_calls.iter().any(|c| c.name == "iMeans"));
    }
}
