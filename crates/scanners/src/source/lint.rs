//! External C++ linters
//!
//! cpplint and cppcheck run on every snippet; clang-tidy only when both came back
//! clean. A tool that is not installed, fails to start or exceeds the timeout
//! contributes nothing instead of failing the unit.

use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

const CPPLINT_MAX_LINES: usize = 15;
const CLANG_TIDY_MAX_LINES: usize = 10;
const SNIPPET_NAME: &str = "snippet.cpp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintTool {
    Cpplint,
    Cppcheck,
    ClangTidy,
}

impl LintTool {
    pub fn program(&self) -> &'static str {
        match self {
            LintTool::Cpplint => "cpplint",
            LintTool::Cppcheck => "cppcheck",
            LintTool::ClangTidy => "clang-tidy",
        }
    }

    fn args(&self, path: &Path) -> Vec<String> {
        let file = path.display().to_string();
        match self {
            LintTool::Cpplint => vec![file],
            LintTool::Cppcheck => vec![
                "--enable=all".to_string(),
                "--quiet".to_string(),
                "--force".to_string(),
                file,
            ],
            LintTool::ClangTidy => vec![file, "--".to_string(), "-std=c++17".to_string()],
        }
    }

    /// Reduces raw tool output to the lines worth showing a model.
    pub fn filter_output(&self, stdout: &str, stderr: &str) -> String {
        match self {
            LintTool::Cpplint => stderr
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .filter(|l| !l.starts_with("Done processing") && !l.starts_with("Total errors"))
                .take(CPPLINT_MAX_LINES)
                .collect::<Vec<_>>()
                .join("\n"),
            LintTool::Cppcheck => format!("{}\n{}", stdout.trim(), stderr.trim())
                .trim()
                .to_string(),
            LintTool::ClangTidy => stdout
                .lines()
                .chain(stderr.lines())
                .filter(|l| l.contains("warning:") || l.contains("error:"))
                .take(CLANG_TIDY_MAX_LINES)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl std::fmt::Display for LintTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

#[derive(Debug, Clone)]
pub struct LintRunner {
    timeout: Duration,
}

impl LintRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the linters in order and returns the non-empty reports.
    pub async fn run_all(&self, code: &str) -> Vec<(LintTool, String)> {
        let mut reports = Vec::new();
        for tool in [LintTool::Cpplint, LintTool::Cppcheck] {
            let output = self.run_tool(tool, code).await;
            if !output.is_empty() {
                reports.push((tool, output));
            }
        }

        if reports.is_empty() {
            let output = self.run_tool(LintTool::ClangTidy, code).await;
            if !output.is_empty() {
                reports.push((LintTool::ClangTidy, output));
            }
        }
        reports
    }

    pub async fn run_tool(&self, tool: LintTool, code: &str) -> String {
        let file = match stage_snippet(code).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Could not stage snippet for {}: {}", tool, e);
                return String::new();
            }
        };

        let mut cmd = AsyncCommand::new(tool.program());
        cmd.args(tool.args(file.path())).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("{} unavailable: {}", tool, e);
                return String::new();
            }
            Err(_) => {
                debug!("{} timed out after {:?}", tool, self.timeout);
                return String::new();
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let path = file.path().display().to_string();
        tool.filter_output(&stdout, &stderr).replace(&path, SNIPPET_NAME)
    }
}

/// Writes the snippet on the blocking pool; linters only read it from disk.
async fn stage_snippet(code: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let code = code.to_string();
    tokio::task::spawn_blocking(move || write_snippet(&code))
        .await
        .map_err(std::io::Error::other)?
}

fn write_snippet(code: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("bughunter-")
        .suffix(".cpp")
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpplint_filter() {
        let stderr = "/tmp/x.cpp:1:  Missing copyright  [legal/copyright] [5]\nDone processing /tmp/x.cpp\nTotal errors found: 1\n";
        let filtered = LintTool::Cpplint.filter_output("", stderr);
        assert_eq!(filtered, "/tmp/x.cpp:1:  Missing copyright  [legal/copyright] [5]");
    }

    #[test]
    fn test_clang_tidy_filter_keeps_diagnostics_only() {
        let stdout = "x.cpp:3:5: warning: unused variable 'v'\n  int v;\n  ^\nx.cpp:4:1: error: unknown type name 'rdi'\n";
        let filtered = LintTool::ClangTidy.filter_output(stdout, "1 warning generated.");
        assert_eq!(filtered.lines().count(), 2);
        assert!(filtered.contains("unused variable"));
    }

    #[test]
    fn test_cppcheck_filter_merges_streams() {
        assert_eq!(LintTool::Cppcheck.filter_output("  ", "\n"), "");
        assert_eq!(LintTool::Cppcheck.filter_output("", "x.cpp:2: style: y"), "x.cpp:2: style: y");
    }

    #[tokio::test]
    async fn test_staged_snippet_holds_the_code() {
        let code = "RDI_BEGIN();\nrdi.dc().iMeas();\nRDI_END();\n";
        let file = stage_snippet(code).await.unwrap();

        assert_eq!(file.path().extension().and_then(|e| e.to_str()), Some("cpp"));
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), code);
    }

    #[tokio::test]
    async fn test_missing_tool_yields_empty_report() {
        let runner = LintRunner::new(Duration::from_secs(1));
        let installed_check = std::process::Command::new(LintTool::Cpplint.program())
            .arg("--version")
            .output();
        if installed_check.is_err() {
            assert!(runner.run_tool(LintTool::Cpplint, "int main() {}").await.is_empty());
        }
    }
}
