pub mod embeddings;
pub mod knowledge_base;
pub mod poll;
pub mod qdrant;

pub use embeddings::EmbeddingClient;
pub use knowledge_base::{KnowledgeBaseClient, KnowledgeBaseStatus};
pub use poll::{PollError, PollOutcome, Poller};
pub use qdrant::QdrantRetriever;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upstream services reject long queries; only the head of a chunk is sent.
pub const DEFAULT_MAX_QUERY_CHARS: usize = 500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A snippet returned by the retrieval service for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source: Option<String>,
    pub score: Option<f32>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            score: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("retrieval request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("retrieval service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected retrieval response: {0}")]
    Decode(String),

    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),
}

/// External knowledge retrieval service.
///
/// Results come back in the service's own relevance order. Implementations
/// do not retry; callers decide what a failure means for their chunk.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    async fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<Passage>, RetrievalError>;
}

/// Adapter in front of a [`RetrievalService`]: bounds the query text and
/// applies a per-call timeout. Cheap to clone; clones share the service and
/// its connection pool.
#[derive(Clone)]
pub struct Retriever {
    service: Arc<dyn RetrievalService>,
    max_query_chars: usize,
    timeout: Duration,
}

impl Retriever {
    pub fn new(service: Arc<dyn RetrievalService>) -> Self {
        Self {
            service,
            max_query_chars: DEFAULT_MAX_QUERY_CHARS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn query(&self, text: &str, max_results: usize) -> Result<Vec<Passage>, RetrievalError> {
        let query = bound_query(text, self.max_query_chars);

        let mut passages = tokio::time::timeout(self.timeout, self.service.retrieve(query, max_results))
            .await
            .map_err(|_| RetrievalError::Timeout(self.timeout))??;

        passages.truncate(max_results);
        Ok(passages)
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn bound_query(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
