use crate::verifier::refine::QueryMergePolicy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub docs: DocsSettings,

    #[serde(default)]
    pub verification: VerificationSettings,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub lint: LintSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>, // If not provided, use OPENAI_API_KEY env var

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>, // For OpenAI-compatible gateways

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsSettings {
    #[serde(default = "default_docs_url")]
    pub url: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSettings {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub merge_policy: QueryMergePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    #[serde(default)]
    pub min_call_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintSettings {
    #[serde(default = "default_lint_enabled")]
    pub enabled: bool,

    #[serde(default = "default_lint_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_docs_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_top_k() -> usize {
    5
}
fn default_max_queries() -> usize {
    8
}
fn default_confidence_threshold() -> f64 {
    0.8
}
fn default_max_retries() -> u32 {
    3
}
fn default_parallelism() -> usize {
    4
}
fn default_call_timeout_secs() -> u64 {
    60
}
fn default_lint_enabled() -> bool {
    true
}
fn default_lint_timeout_secs() -> u64 {
    15
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for DocsSettings {
    fn default() -> Self {
        Self {
            url: default_docs_url(),
            top_k: default_top_k(),
            max_queries: default_max_queries(),
        }
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_retries: default_max_retries(),
            merge_policy: QueryMergePolicy::default(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            call_timeout_secs: default_call_timeout_secs(),
            min_call_interval_ms: 0,
        }
    }
}

impl Default for LintSettings {
    fn default() -> Self {
        Self {
            enabled: default_lint_enabled(),
            timeout_secs: default_lint_timeout_secs(),
        }
    }
}

impl BatchSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }
}

impl LintSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Picks the parser from the file extension; anything but `.json` is read as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        };
        config.with_context(|| format!("Failed to load config from {}", path.display()))
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlays environment variables onto the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = lookup("BUGHUNTER_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("BUGHUNTER_DOCS_URL") {
            self.docs.url = url;
        }
        if let Some(raw) = lookup("BUGHUNTER_CONFIDENCE_THRESHOLD") {
            self.verification.confidence_threshold = parse_var("BUGHUNTER_CONFIDENCE_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("BUGHUNTER_MAX_RETRIES") {
            self.verification.max_retries = parse_var("BUGHUNTER_MAX_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("BUGHUNTER_PARALLELISM") {
            self.batch.parallelism = parse_var("BUGHUNTER_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("BUGHUNTER_CALL_TIMEOUT_SECS") {
            self.batch.call_timeout_secs = parse_var("BUGHUNTER_CALL_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("BUGHUNTER_CALL_INTERVAL_MS") {
            self.batch.min_call_interval_ms = parse_var("BUGHUNTER_CALL_INTERVAL_MS", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.verification.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!("confidence_threshold must be within [0, 1], got {}", threshold);
        }
        if self.batch.parallelism == 0 {
            bail!("parallelism must be at least 1");
        }
        if self.batch.call_timeout_secs == 0 {
            bail!("call_timeout_secs must be at least 1");
        }
        if self.docs.url.trim().is_empty() {
            bail!("docs.url must not be empty");
        }
        if self.docs.top_k == 0 || self.docs.max_queries == 0 {
            bail!("docs.top_k and docs.max_queries must be at least 1");
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", raw, name, e))
}

pub const EXAMPLE_CONFIG: &str = r#"# BugHunter pipeline configuration

llm:
  model: gpt-4o
  # api_key: sk-...  # Optional, defaults to OPENAI_API_KEY env var
  # base_url: https://gateway.example.com/v1
  temperature: 0.0
  max_tokens: 2000

docs:
  url: http://localhost:8000
  top_k: 5
  max_queries: 8

verification:
  confidence_threshold: 0.8
  max_retries: 3
  merge_policy: apis_first   # or hints_first

batch:
  parallelism: 4
  call_timeout_secs: 60
  min_call_interval_ms: 0

lint:
  enabled: true
  timeout_secs: 15
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.verification.confidence_threshold, 0.8);
        assert_eq!(config.verification.max_retries, 3);
        assert_eq!(config.batch.parallelism, 4);
        assert_eq!(config.docs.url, "http://localhost:8000");
        assert!(config.lint.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_config_parses() {
        let config: PipelineConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.docs.top_k, 5);
        assert_eq!(config.verification.merge_policy, QueryMergePolicy::ApisFirst);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: PipelineConfig =
            serde_yaml::from_str("verification:\n  max_retries: 1\n").unwrap();
        assert_eq!(config.verification.max_retries, 1);
        assert_eq!(config.verification.confidence_threshold, 0.8);
        assert_eq!(config.batch.call_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("BUGHUNTER_MODEL", "gpt-4o-mini"),
            ("BUGHUNTER_PARALLELISM", "8"),
            ("BUGHUNTER_CONFIDENCE_THRESHOLD", "0.7"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.batch.parallelism, 8);
        assert_eq!(config.verification.confidence_threshold, 0.7);

        let err = config
            .apply_vars(|key| (key == "BUGHUNTER_MAX_RETRIES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("BUGHUNTER_MAX_RETRIES"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.verification.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.batch.parallelism = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.docs.url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("config.json");
        std::fs::write(&json, r#"{"batch": {"parallelism": 2}}"#).unwrap();
        assert_eq!(PipelineConfig::from_file(&json).unwrap().batch.parallelism, 2);

        let yaml = dir.path().join("config.yaml");
        PipelineConfig::default().save_yaml(&yaml).unwrap();
        assert_eq!(PipelineConfig::from_file(&yaml).unwrap().llm.model, "gpt-4o");
    }
}
