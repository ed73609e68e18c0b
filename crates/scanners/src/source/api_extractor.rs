//! Call-site extraction over the C++ AST
//!
//! Parses the snippet with tree-sitter and records every call expression as an API
//! usage: the callee's method name plus its receiver chain with arguments elided,
//! so `rdi.dc().pin("VDD").vForce(1 V)` yields `vForce` / `rdi.dc().pin().vForce`.
//! Snippets are fragments rather than translation units; tree-sitter recovers from
//! the resulting syntax errors and still reports the calls it can see.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Parser, Query, QueryCursor};

const CALL_QUERY: &str = "(call_expression function: (_) @callee)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCall {
    pub name: String,
    pub chain: String,
    pub line: u32,
}

#[derive(Debug, Default)]
pub struct CppApiExtractor;

impl CppApiExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, source: &str) -> Result<Vec<ApiCall>> {
        let mut parser = Parser::new();
        let language = tree_sitter_cpp::LANGUAGE.into();
        parser.set_language(&language)?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse source"))?;

        let query = Query::new(&language, CALL_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, tree.root_node(), source.as_bytes());

        let mut calls = Vec::new();
        matches.advance();
        while let Some(match_) = matches.get() {
            for capture in match_.captures {
                let node = capture.node;
                let chain = elide_arguments(&source[node.byte_range()]);
                let name = method_name(&chain);
                if !is_identifier(name) {
                    continue;
                }
                calls.push(ApiCall {
                    name: name.to_string(),
                    chain,
                    line: node.start_position().row as u32 + 1,
                });
            }
            matches.advance();
        }

        calls.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.chain.len().cmp(&b.chain.len())));
        Ok(calls)
    }

    /// Distinct method names in order of first appearance.
    pub fn method_names(&self, source: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for call in self.extract(source)? {
            if !names.contains(&call.name) {
                names.push(call.name);
            }
        }
        Ok(names)
    }
}

/// Drops whitespace and everything between matching parentheses.
fn elide_arguments(callee: &str) -> String {
    let mut out = String::with_capacity(callee.len());
    let mut depth = 0usize;
    for c in callee.chars() {
        match c {
            '(' => {
                if depth == 0 {
                    out.push('(');
                }
                depth += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    out.push(')');
                }
            }
            c if depth == 0 && !c.is_whitespace() => out.push(c),
            _ => {}
        }
    }
    out
}

fn method_name(chain: &str) -> &str {
    let chain = match chain.strip_suffix('>') {
        Some(_) => chain.rfind('<').map_or(chain, |idx| &chain[..idx]),
        None => chain,
    };
    chain
        .rsplit(|c: char| c == '.' || c == ':' || c == '>')
        .next()
        .unwrap_or(chain)
        .trim_start_matches('-')
        .trim()
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Method names called anywhere on the given line.
pub fn methods_on_line(calls: &[ApiCall], line: u32) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for call in calls.iter().filter(|c| c.line == line) {
        if !names.contains(&call.name.as_str()) {
            names.push(&call.name);
        }
    }
    names
}
