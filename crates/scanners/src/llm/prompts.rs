use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const ANALYZER_TEMPLATE: &str = "code_analyzer";
pub const VERIFIER_TEMPLATE: &str = "verifier";

#[derive(Debug, Error)]
#[error("Template '{0}' not found")]
pub struct TemplateNotFound(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub system_prompt: String,
    pub user_prompt_template: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
            user_prompt_template: String::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_user_template(mut self, template: impl Into<String>) -> Self {
        self.user_prompt_template = template.into();
        self
    }
}

pub struct PromptBuilder {
    templates: HashMap<String, PromptTemplate>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            templates: HashMap::new(),
        };

        builder.add_template(Self::analyzer_template());
        builder.add_template(Self::verifier_template());
        builder
    }

    pub fn add_template(&mut self, template: PromptTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn template(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }

    pub fn build_prompt(
        &self,
        template_name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(String, String), TemplateNotFound> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| TemplateNotFound(template_name.to_string()))?;

        let system_prompt = substitute_variables(&template.system_prompt, variables);
        let user_prompt = substitute_variables(&template.user_prompt_template, variables);

        Ok((system_prompt, user_prompt))
    }

    fn analyzer_template() -> PromptTemplate {
        PromptTemplate::new(ANALYZER_TEMPLATE)
            .with_system_prompt(ANALYZER_SYSTEM_PROMPT)
            .with_user_template(ANALYZER_USER_TEMPLATE)
    }

    fn verifier_template() -> PromptTemplate {
        PromptTemplate::new(VERIFIER_TEMPLATE)
            .with_system_prompt(VERIFIER_SYSTEM_PROMPT)
            .with_user_template(VERIFIER_USER_TEMPLATE)
    }
}

/// Single pass over the template: `{name}` is replaced when `name` is a known
/// variable, everything else (including braces in substituted C++ code) is kept.
fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if variables.contains_key(&after[..close]) => {
                result.push_str(&variables[&after[..close]]);
                rest = &after[close + 1..];
            }
            _ => {
                result.push('{');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

const ANALYZER_SYSTEM_PROMPT: &str = r#"You are a senior C++ / RDI semiconductor test-code analyst.
You will receive a snippet of C++ code, context describing the bug, and static analysis hints.

Your job:
1. Number every line of the code starting from 1.
2. List every RDI API / function call (e.g. rdi.dc().vForce(), rdi.smartVec().vecEditMode()).
3. Read the CONTEXT carefully - it usually describes WHAT BUG exists in the code.
4. Find ONLY the line(s) that match the bug described in CONTEXT.

BUG TYPES TO LOOK FOR:
- Wrong mode/constant values (e.g. VECD instead of VTT)
- Misspelled function names (e.g. iMeans instead of iMeas)
- Swapped argument order (e.g. iClamp(high, low) instead of iClamp(low, high))
- Wrong lifecycle ordering (RDI_END before RDI_BEGIN)
- Pin name mismatch between related operations
- Wrong terminal method (e.g. .burst() instead of .execute())
- Values outside documented ranges

RULES:
- Focus on the bug described in CONTEXT. Do not invent additional bugs.
- Only flag lines with definite errors.
- Do not flag RDI_BEGIN or RDI_END unless they are in wrong order.
- Do not flag valid method chaining.

Output EXACTLY (no markdown fences):

APIS:
<api_1>
<api_2>

CANDIDATES:
<line_number>|<line_content>|<what is wrong and what it should be>
"#;

const ANALYZER_USER_TEMPLATE: &str = r#"CODE:
{code}

CONTEXT:
{context}

STATIC ANALYSIS HINTS:
{static_analysis}"#;

const VERIFIER_SYSTEM_PROMPT: &str = r#"You are a precise C++ RDI semiconductor bug verifier.

You receive BUGGY CODE (numbered), CONTEXT, CANDIDATE LINES, DOCS, and STATIC hints.

VERIFICATION PROCESS:
1. Read the CONTEXT - it describes what the code should do or what bug exists.
2. Compare each CANDIDATE line against the DOCS to verify whether it is actually wrong.
3. Cite evidence from DOCS or CONTEXT for every bug.

BUG TYPES:
- Misspelled or wrong function names (iMeans -> iMeas, imeasRange -> iMeasRange)
- Wrong argument order (iClamp(high, low) should be iClamp(low, high))
- Wrong lifecycle order (RDI_END before RDI_BEGIN)
- Pin name typos or mismatches between related operations
- Wrong terminal method (.burst() instead of .execute())
- Wrong method chaining (rdi.burstUpload.smartVec() vs rdi.smartVec().burstUpload())
- Values out of range (vForceRange(35V) when max is 30V, samples(9216) when max is 8192)
- Non-existent methods (push_forward should be push_back)
- Missing or extra parameters
- Wrong variable references

RULES:
- Report all buggy lines, comma-separated.
- Keep the explanation short: what is wrong and what it should be.
- No hedging words.
- When the DOCS do not contain what you need to decide, list what is missing under
  REFINED_QUERIES, one documentation search query per line.

CONFIDENCE: a number between 0 and 1, or one of high|medium|low.
- high / >= 0.8: concrete evidence in CONTEXT or DOCS proves the bug.
- low: you suspect a bug but cannot cite evidence.

Output format (no markdown, no fences):

CONFIDENCE: <score>
BUG_LINES: <comma-separated line numbers>
EXPLANATION: <for each bug line: "Line X: [what's wrong] should be [correct]. Evidence: [cite CONTEXT or DOCS]">
REFINED_QUERIES:
<query_1>
<query_2>
"#;

const VERIFIER_USER_TEMPLATE: &str = r#"BUGGY CODE (with line numbers):
{numbered_code}

CONTEXT: {context}

CANDIDATES:
{candidates}

DOCS:
{docs}

STATIC: {static_analysis}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder_templates() {
        let builder = PromptBuilder::new();

        let mut variables = HashMap::new();
        variables.insert("code".to_string(), "rdi.dc().vForce(1.0);".to_string());
        variables.insert("context".to_string(), "Force voltage on VDD".to_string());
        variables.insert("static_analysis".to_string(), "none".to_string());

        let (system, user) = builder.build_prompt(ANALYZER_TEMPLATE, &variables).unwrap();

        assert!(system.contains("CANDIDATES:"));
        assert!(user.contains("rdi.dc().vForce(1.0);"));
        assert!(user.contains("Force voltage on VDD"));
    }

    #[test]
    fn test_unknown_template() {
        let builder = PromptBuilder::new();
        let err = builder.build_prompt("missing", &HashMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "Template 'missing' not found");
    }

    #[test]
    fn test_variable_substitution() {
        let template = "Hello {name}, you have {count} messages";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        assert_eq!(
            substitute_variables(template, &vars),
            "Hello Alice, you have 5 messages"
        );
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let mut vars = HashMap::new();
        vars.insert("code".to_string(), "if (x) { y = {context}; }".to_string());
        vars.insert("context".to_string(), "CTX".to_string());

        let result = substitute_variables("{code} / {context} / {unknown}", &vars);
        assert_eq!(result, "if (x) { y = {context}; } / CTX / {unknown}");
    }
}
