use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

impl LLMError {
    /// Errors that will fail on every call for this credential.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LLMError::Authentication(_))
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimitExceeded | LLMError::NetworkError(_) | LLMError::Timeout(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn analyze(&self, request: LLMRequest) -> Result<LLMResponse, LLMError>;

    fn model_name(&self) -> &str;

    fn estimate_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}

pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key.into());
        if let Some(base) = base_url {
            config = config.with_api_base(base);
        }

        Self {
            client: Client::with_config(config),
            model: model.into(),
            max_retries: 3,
        }
    }

    /// Total attempts per request, transient failures included.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn is_reasoning_model(&self) -> bool {
        self.model.starts_with("o1") || self.model.starts_with("o3") || self.model.starts_with("o4")
    }

    fn classify(err: OpenAIError) -> LLMError {
        match err {
            OpenAIError::Reqwest(e) => LLMError::NetworkError(e.to_string()),
            OpenAIError::ApiError(api) => {
                let lower = api.message.to_lowercase();
                if lower.contains("api key")
                    || lower.contains("unauthorized")
                    || lower.contains("authentication")
                {
                    LLMError::Authentication(api.message)
                } else if lower.contains("rate limit") {
                    LLMError::RateLimitExceeded
                } else {
                    LLMError::ApiError(api.message)
                }
            }
            other => LLMError::ApiError(other.to_string()),
        }
    }

    fn build_messages(
        &self,
        request: &LLMRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LLMError> {
        let to_api_error = |e: OpenAIError| LLMError::ApiError(e.to_string());

        if self.is_reasoning_model() {
            let combined = format!(
                "Instructions:\n{}\n\nTask:\n{}",
                request.system_prompt, request.user_prompt
            );
            let user = ChatCompletionRequestUserMessageArgs::default()
                .content(combined)
                .build()
                .map_err(to_api_error)?;
            return Ok(vec![user.into()]);
        }

        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_prompt.clone())
            .build()
            .map_err(to_api_error)?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user_prompt.clone())
            .build()
            .map_err(to_api_error)?;

        Ok(vec![system.into(), user.into()])
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn analyze(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
        let messages = self.build_messages(&request)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if !self.is_reasoning_model() {
            builder
                .temperature(request.temperature)
                .max_tokens(request.max_tokens);
        }
        let api_request = builder
            .build()
            .map_err(|e| LLMError::ApiError(e.to_string()))?;

        debug!(
            "Sending request to model {} (temperature {}, max tokens {})",
            self.model, request.temperature, request.max_tokens
        );

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.chat().create(api_request.clone()).await {
                Ok(response) => break response,
                Err(e) => {
                    let error = Self::classify(e);
                    warn!("LLM API error (attempt {}/{}): {}", attempt, self.max_retries, error);

                    if !error.is_transient() || attempt >= self.max_retries {
                        return Err(error);
                    }

                    let wait_time = if matches!(error, LLMError::RateLimitExceeded) {
                        Duration::from_secs(2_u64.pow(attempt))
                    } else {
                        Duration::from_millis(100 * attempt as u64)
                    };
                    tokio::time::sleep(wait_time).await;
                }
            }
        };

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LLMError::InvalidResponse("No content in response".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        debug!("Received response with {} tokens", usage.total_tokens);

        Ok(LLMResponse {
            content,
            model: response.model,
            usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
