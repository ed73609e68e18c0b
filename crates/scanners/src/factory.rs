use crate::analyzer::LLMAnalyzer;
use crate::config::{LlmSettings, PipelineConfig};
use crate::judge::LLMJudge;
use crate::llm::{LLMProvider, OpenAIProvider};
use crate::retriever::{DocServerRetriever, Retriever};
use crate::runner::{BatchEngine, Throttle};
use crate::source::{LintRunner, StaticAnalyzer};
use crate::verifier::{LoopSettings, VerificationLoop};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Wires configured collaborators into a ready-to-run batch engine.
pub struct PipelineFactory {
    config: PipelineConfig,
    provider: Arc<dyn LLMProvider>,
    retriever: Arc<dyn Retriever>,
    throttle: Arc<Throttle>,
}

impl PipelineFactory {
    /// OpenAI provider and documentation-server retriever from the config, both
    /// behind one shared throttle.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config
            .llm
            .api_key
            .clone()
            .context("No LLM API key configured (set OPENAI_API_KEY or llm.api_key)")?;

        let throttle = Arc::new(Throttle::new(config.batch.min_call_interval()));
        let provider = openai_provider(&config.llm, api_key);
        let retriever =
            DocServerRetriever::new(config.docs.url.clone(), config.docs.top_k, config.docs.max_queries)
                .with_throttle(throttle.clone());

        Ok(Self {
            provider: Arc::new(provider),
            retriever: Arc::new(retriever),
            throttle,
            config,
        })
    }

    /// The retriever is used as given; it does not share the factory's throttle.
    pub fn with_collaborators(
        config: PipelineConfig,
        provider: Arc<dyn LLMProvider>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            throttle: Arc::new(Throttle::new(config.batch.min_call_interval())),
            config,
            provider,
            retriever,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            confidence_threshold: self.config.verification.confidence_threshold,
            max_retries: self.config.verification.max_retries,
            merge_policy: self.config.verification.merge_policy,
            call_timeout: self.config.batch.call_timeout(),
        }
    }

    pub fn create_engine(&self) -> BatchEngine {
        let llm = &self.config.llm;
        let lint = self
            .config
            .lint
            .enabled
            .then(|| LintRunner::new(self.config.lint.timeout()));

        let analyzer = LLMAnalyzer::new(self.provider.clone(), StaticAnalyzer::new(lint))
            .with_sampling(llm.temperature, llm.max_tokens);
        let judge = LLMJudge::new(self.provider.clone()).with_sampling(llm.temperature, llm.max_tokens);

        let verifier = VerificationLoop::new(
            Arc::new(analyzer),
            self.retriever.clone(),
            Arc::new(judge),
            self.loop_settings(),
        )
        .with_throttle(self.throttle.clone());

        BatchEngine::new(verifier).with_parallelism(self.config.batch.parallelism)
    }
}

/// One attempt per request: the verification loop owns the retry budget, and every
/// attempt has to pass through the throttle.
fn openai_provider(llm: &LlmSettings, api_key: String) -> OpenAIProvider {
    OpenAIProvider::new(api_key, llm.model.clone(), llm.base_url.as_deref()).with_max_retries(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLLMProvider;

    #[test]
    fn test_from_config_requires_api_key() {
        let mut config = PipelineConfig::default();
        config.llm.api_key = None;
        assert!(PipelineFactory::from_config(config).is_err());

        let mut config = PipelineConfig::default();
        config.llm.api_key = Some("sk-test".to_string());
        config.batch.parallelism = 6;
        let factory = PipelineFactory::from_config(config).unwrap();
        assert_eq!(factory.create_engine().parallelism(), 6);
    }

    #[test]
    fn test_provider_makes_a_single_attempt() {
        let provider = openai_provider(&LlmSettings::default(), "sk-test".to_string());
        assert_eq!(provider.max_retries(), 1);
    }

    #[test]
    fn test_loop_settings_follow_config() {
        let mut config = PipelineConfig::default();
        config.verification.max_retries = 1;
        config.batch.call_timeout_secs = 9;

        let factory = PipelineFactory::with_collaborators(
            config,
            Arc::new(MockLLMProvider::new()),
            Arc::new(DocServerRetriever::new("http://127.0.0.1:9", 5, 8)),
        );
        let settings = factory.loop_settings();
        assert_eq!(settings.max_rounds(), 2);
        assert_eq!(settings.call_timeout, std::time::Duration::from_secs(9));
    }
}
