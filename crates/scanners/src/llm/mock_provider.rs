use crate::llm::provider::{LLMError, LLMProvider, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic stand-in for a real model.
///
/// Resolution order per call: queued script entries, then the first registered
/// pattern found in the prompt, then the default reply.
pub struct MockLLMProvider {
    script: Mutex<VecDeque<Result<String, LLMError>>>,
    responses: HashMap<String, String>,
    default_response: String,
    call_count: AtomicUsize,
    should_fail: bool,
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLLMProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responses: HashMap::new(),
            default_response: "APIS:\n\nCANDIDATES:\n".to_string(),
            call_count: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut provider = Self::new();
        provider.should_fail = true;
        provider
    }

    pub fn with_default(mut self, content: impl Into<String>) -> Self {
        self.default_response = content.into();
        self
    }

    pub fn with_response(mut self, pattern: &str, content: impl Into<String>) -> Self {
        self.responses.insert(pattern.to_lowercase(), content.into());
        self
    }

    /// Queues a reply consumed by the next call.
    pub fn push_reply(&self, reply: Result<String, LLMError>) {
        self.script.lock().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    fn generate_response(&self, request: &LLMRequest) -> Result<String, LLMError> {
        if let Some(reply) = self.script.lock().pop_front() {
            return reply;
        }

        let combined_prompt =
            format!("{} {}", request.system_prompt, request.user_prompt).to_lowercase();
        let mut patterns: Vec<&String> = self.responses.keys().collect();
        patterns.sort();
        for pattern in patterns {
            if combined_prompt.contains(pattern.as_str()) {
                return Ok(self.responses[pattern].clone());
            }
        }

        Ok(self.default_response.clone())
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn analyze(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(LLMError::ApiError(
                "Mock provider configured to fail".to_string(),
            ));
        }

        let content = self.generate_response(&request)?;

        Ok(LLMResponse {
            content,
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 200,
                total_tokens: 300,
            },
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user_prompt: &str) -> LLMRequest {
        LLMRequest {
            system_prompt: "Test".to_string(),
            user_prompt: user_prompt.to_string(),
            temperature: 0.0,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_mock_provider_call_counting() {
        let provider = MockLLMProvider::new();
        assert_eq!(provider.call_count(), 0);

        provider.analyze(request("a")).await.unwrap();
        provider.analyze(request("b")).await.unwrap();
        assert_eq!(provider.call_count(), 2);

        provider.reset_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_provider_failure() {
        let provider = MockLLMProvider::failing();
        assert!(provider.analyze(request("Test")).await.is_err());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_script_takes_priority_over_patterns() {
        let provider = MockLLMProvider::new().with_response("vforce", "pattern reply");
        provider.push_reply(Ok("scripted".to_string()));
        provider.push_reply(Err(LLMError::Authentication("denied".to_string())));

        let first = provider.analyze(request("check vForce")).await.unwrap();
        assert_eq!(first.content, "scripted");

        let second = provider.analyze(request("check vForce")).await;
        assert!(matches!(second, Err(LLMError::Authentication(_))));

        let third = provider.analyze(request("check vForce")).await.unwrap();
        assert_eq!(third.content, "pattern reply");

        let fourth = provider.analyze(request("unrelated")).await.unwrap();
        assert!(fourth.content.contains("CANDIDATES:"));
    }
}
