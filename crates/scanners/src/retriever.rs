//! Documentation retrieval
//!
//! The documentation server indexes the vendor RDI manuals and answers free-text
//! queries with scored snippets. Each query is one `POST {base}/search` call; the
//! results of all queries in a batch are merged, de-duplicated by text and ranked.

use crate::core::{Evidence, RetrievalError};
use crate::runner::Throttle;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, queries: &[String]) -> Result<Vec<Evidence>, RetrievalError>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    text: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    source: Option<String>,
}

pub struct DocServerRetriever {
    client: Client,
    base_url: String,
    top_k: usize,
    max_queries: usize,
    throttle: Arc<Throttle>,
}

impl DocServerRetriever {
    pub fn new(base_url: impl Into<String>, top_k: usize, max_queries: usize) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            top_k,
            max_queries,
            throttle: Arc::new(Throttle::unlimited()),
        }
    }

    /// Every `/search` request waits for its own slot.
    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn search(&self, query: &str) -> Result<Vec<Evidence>, RetrievalError> {
        self.throttle.acquire().await;
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest {
                query,
                top_k: self.top_k,
            })
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status { status, body });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|hit| !hit.text.trim().is_empty())
            .map(|hit| {
                let evidence = Evidence::new(query, hit.text, hit.score);
                match hit.source {
                    Some(source) => evidence.with_source(source),
                    None => evidence,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for DocServerRetriever {
    /// Partial success is success: a failing query is logged and skipped as long as
    /// another query produced results. Authorization failures abort immediately.
    async fn retrieve(&self, queries: &[String]) -> Result<Vec<Evidence>, RetrievalError> {
        let mut collected: Vec<Evidence> = Vec::new();
        let mut first_error = None;

        for query in queries.iter().take(self.max_queries) {
            debug!("Searching documentation for '{}'", query);
            match self.search(query).await {
                Ok(hits) => {
                    for hit in hits {
                        if !collected.iter().any(|e| e.text == hit.text) {
                            collected.push(hit);
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Documentation query '{}' failed: {}", query, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if collected.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        collected.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(collected)
    }
}
