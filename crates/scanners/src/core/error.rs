use crate::llm::prompts::TemplateNotFound;
use crate::llm::provider::LLMError;
use std::time::Duration;
use thiserror::Error;

/// The analyzer could not produce a usable candidate list.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unusable analyzer response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Prompt(#[from] TemplateNotFound),
}

impl AnalysisError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_fatal(),
            Self::Prompt(_) => true,
            _ => false,
        }
    }
}

/// Transport-level failure talking to the documentation server.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Documentation server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Retrieval timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid documentation server response: {0}")]
    InvalidResponse(String),
}

impl RetrievalError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == 401 || *status == 403)
    }
}

/// The judge answered without a usable score, or did not answer.
#[derive(Debug, Error)]
pub enum JudgmentError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("Judgment timed out after {0:?}")]
    Timeout(Duration),

    #[error("Judge response has no confidence score: {0}")]
    MissingScore(String),

    #[error(transparent)]
    Prompt(#[from] TemplateNotFound),
}

impl JudgmentError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_fatal(),
            Self::Prompt(_) => true,
            _ => false,
        }
    }
}

/// Reading or writing the tabular input/output files.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AnalysisError::Llm(LLMError::Authentication("bad key".into())).is_fatal());
        assert!(!AnalysisError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(RetrievalError::Status {
            status: 401,
            body: String::new()
        }
        .is_fatal());
        assert!(!RetrievalError::Status {
            status: 503,
            body: String::new()
        }
        .is_fatal());
        assert!(!JudgmentError::MissingScore("x".into()).is_fatal());
    }
}
