use async_trait::async_trait;
use serde_json::{Value, json};

use crate::embeddings::EmbeddingClient;
use crate::{Passage, RetrievalError, RetrievalService};

/// Vector search over a Qdrant collection through its REST API.
///
/// Points are expected to carry `text` and, optionally, `source` in their payload.
pub struct QdrantRetriever {
    base_url: String,
    collection_name: String,
    embedding_client: EmbeddingClient,
    client: reqwest::Client,
}

impl QdrantRetriever {
    pub fn new(
        base_url: String,
        collection_name: String,
        embedding_client: EmbeddingClient,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url,
            collection_name,
            embedding_client,
            client,
        }
    }
}

#[async_trait]
impl RetrievalService for QdrantRetriever {
    async fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<Passage>, RetrievalError> {
        let query_embedding = self.embedding_client.embed(query).await?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection_name
        );

        let body = json!({
            "vector": query_embedding,
            "limit": max_results,
            "with_payload": true
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(RetrievalError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("qdrant response: {e}")))?;

        parse_search_response(&result)
    }
}

fn parse_search_response(result: &Value) -> Result<Vec<Passage>, RetrievalError> {
    let points = result["result"]
        .as_array()
        .ok_or_else(|| RetrievalError::Decode("missing `result` array".to_string()))?;

    let mut passages = Vec::new();
    for point in points {
        let payload = &point["payload"];

        let text = payload["text"].as_str().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }

        passages.push(Passage {
            content: text.to_string(),
            source: payload["source"].as_str().map(str::to_string),
            score: point["score"].as_f64().map(|s| s as f32),
        });
    }

    Ok(passages)
}
