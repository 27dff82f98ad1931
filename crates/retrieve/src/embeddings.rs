use serde::{Deserialize, Serialize};

use crate::RetrievalError;

/// Ollama embedding endpoint, used to turn a query into a vector for Qdrant.
#[derive(Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(base_url: String, model: String, client: reqwest::Client) -> Self {
        Self {
            base_url,
            model,
            client,
        }
    }

    /// Generate embedding for text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(RetrievalError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("embedding response: {e}")))?;

        if embedding_response.embedding.is_empty() {
            return Err(RetrievalError::Decode("empty embedding".to_string()));
        }

        Ok(embedding_response.embedding)
    }
}
