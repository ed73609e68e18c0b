//! LLM integration for the analyzer and the verifier
//!
//! The provider abstraction hides which backend answers a prompt, so the analyzer and
//! judge adapters can run against OpenAI-compatible endpoints in production and the
//! scripted mock in tests. Prompts ask for a line-oriented reply format that the
//! schema module parses back into typed responses.

pub mod mock_provider;
pub mod prompts;
pub mod provider;
pub mod schemas;

pub use mock_provider::MockLLMProvider;
pub use prompts::{PromptBuilder, PromptTemplate, TemplateNotFound};
pub use provider::{LLMError, LLMProvider, LLMRequest, LLMResponse, OpenAIProvider, TokenUsage};
pub use schemas::{AnalyzerResponse, CandidateLine, JudgeResponse};
