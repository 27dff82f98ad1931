use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::poll::{PollError, PollOutcome, Poller};
use crate::{Passage, RetrievalError, RetrievalService};

/// Client for a managed knowledge base exposing a `retrieve` endpoint.
///
/// Requests and responses follow the Bedrock agent-runtime shape:
/// `POST {base_url}/knowledgebases/{id}/retrieve`.
#[derive(Clone)]
pub struct KnowledgeBaseClient {
    base_url: String,
    knowledge_base_id: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest<'a> {
    retrieval_query: RetrievalQuery<'a>,
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Serialize)]
struct RetrievalQuery<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Deserialize)]
struct RetrievalResult {
    #[serde(default)]
    content: ResultContent,
    #[serde(default)]
    location: Option<ResultLocation>,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Default, Deserialize)]
struct ResultContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultLocation {
    s3_location: Option<UriLocation>,
    web_location: Option<UrlLocation>,
}

#[derive(Deserialize)]
struct UriLocation {
    uri: String,
}

#[derive(Deserialize)]
struct UrlLocation {
    url: String,
}

impl ResultLocation {
    fn into_source(self) -> Option<String> {
        self.s3_location
            .map(|l| l.uri)
            .or_else(|| self.web_location.map(|l| l.url))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnowledgeBaseStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetKnowledgeBaseResponse {
    knowledge_base: KnowledgeBaseInfo,
}

#[derive(Deserialize)]
struct KnowledgeBaseInfo {
    status: KnowledgeBaseStatus,
}

impl KnowledgeBaseClient {
    pub fn new(base_url: String, knowledge_base_id: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            knowledge_base_id,
            api_key: None,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn knowledge_base_id(&self) -> &str {
        &self.knowledge_base_id
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    pub async fn status(&self) -> Result<KnowledgeBaseStatus, RetrievalError> {
        let url = format!("{}/knowledgebases/{}", self.base_url, self.knowledge_base_id);

        let response = self.authorize(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(RetrievalError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let info: GetKnowledgeBaseResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Decode(format!("knowledge base status: {e}")))?;

        Ok(info.knowledge_base.status)
    }

    /// Poll until the knowledge base reports `ACTIVE`.
    ///
    /// Transient request errors keep polling; a `FAILED` or `DELETING`
    /// knowledge base ends the wait immediately.
    pub async fn wait_until_ready(&self, poller: &Poller) -> Result<(), PollError> {
        let resource = format!("knowledge base {}", self.knowledge_base_id);
        let client = self;

        poller
            .wait_until(&resource, move || async move {
                match client.status().await {
                    Ok(KnowledgeBaseStatus::Active) => PollOutcome::Ready(()),
                    Ok(status @ (KnowledgeBaseStatus::Creating | KnowledgeBaseStatus::Updating)) => {
                        PollOutcome::Pending(format!("{status:?}").to_lowercase())
                    }
                    Ok(status) => PollOutcome::Failed(format!("unexpected state {status:?}")),
                    Err(e) => {
                        warn!(error = %e, "Error checking knowledge base status");
                        PollOutcome::Pending(e.to_string())
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl RetrievalService for KnowledgeBaseClient {
    async fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<Passage>, RetrievalError> {
        let url = format!(
            "{}/knowledgebases/{}/retrieve",
            self.base_url, self.knowledge_base_id
        );

        let request = RetrieveRequest {
            retrieval_query: RetrievalQuery { text: query },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: max_results,
                },
            },
        };

        let response = self
            .authorize(self.client.post(&url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RetrievalError::Status {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        parse_retrieve_response(&body)
    }
}

fn parse_retrieve_response(body: &str) -> Result<Vec<Passage>, RetrievalError> {
    let response: RetrieveResponse = serde_json::from_str(body)
        .map_err(|e| RetrievalError::Decode(format!("retrieve response: {e}")))?;

    Ok(response
        .retrieval_results
        .into_iter()
        .filter(|r| !r.content.text.trim().is_empty())
        .map(|r| Passage {
            content: r.content.text,
            source: r.location.and_then(ResultLocation::into_source),
            score: r.score,
        })
        .collect())
}
