
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::{ChatError, Result, UpstreamStage};

/// Provenance recorded alongside every indexed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub page: String,
}

/// A bounded slice of extracted document text, independently indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: SourceMetadata,
}

/// One nearest-neighbour result. Matches arrive ordered by descending score;
/// ordering among equal scores is decided by the index and is not
/// deterministic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetrievedMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: MatchMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MatchMetadata {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertPoint<'a>>,
}

#[derive(Debug, Serialize)]
struct UpsertPoint<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: UpsertMetadata<'a>,
}

/// Wire metadata carries the chunk text so retrieval can return passages
/// without a second lookup.
#[derive(Debug, Serialize)]
struct UpsertMetadata<'a> {
    source: &'a str,
    page: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RetrievedMatch>,
}

/// Client for the external vector index. Stores `(id, vector, metadata)`
/// triples and answers nearest-neighbour queries.
#[derive(Debug, Clone)]
pub struct VectorIndexClient {
    api_base: Url,
    api_key: String,
    top_k: u32,
    client: Client,
}

impl VectorIndexClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_base = Url::parse(&config.index.api_base)
            .map_err(|e| ChatError::Config(format!("Invalid index API base: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            api_base,
            api_key: config.index.api_key.clone(),
            top_k: config.index.top_k,
            client,
        })
    }

    /// Insert or replace a chunk keyed by its deterministic id. Re-submitting
    /// the same id is idempotent.
    #[inline]
    pub async fn upsert(&self, chunk: &DocumentChunk, vector: &[f32]) -> Result<u64> {
        debug!("Upserting chunk {} ({} dims)", chunk.id, vector.len());

        let request = UpsertRequest {
            vectors: vec![UpsertPoint {
                id: &chunk.id,
                values: vector,
                metadata: UpsertMetadata {
                    source: &chunk.metadata.source,
                    page: &chunk.metadata.page,
                    text: &chunk.text,
                },
            }],
        };

        let body = self.post("vectors/upsert", &request).await?;
        let parsed: UpsertResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::Network(format!("Failed to parse upsert response: {}", e)))?;

        Ok(parsed.upserted_count)
    }

    /// Return up to `top_k` nearest matches for `vector`, best first. An empty
    /// corpus yields an empty list, not an error.
    #[inline]
    pub async fn query(&self, vector: &[f32]) -> Result<Vec<RetrievedMatch>> {
        let request = QueryRequest {
            vector,
            top_k: self.top_k,
            include_metadata: true,
        };

        let body = self.post("query", &request).await?;
        let parsed: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::Network(format!("Failed to parse query response: {}", e)))?;

        debug!("Index returned {} matches", parsed.matches.len());
        Ok(parsed.matches)
    }

    async fn post<T: Serialize>(&self, path: &str, request: &T) -> Result<String> {
        let url = self
            .api_base
            .join(path)
            .map_err(|e| ChatError::Config(format!("Failed to build index URL: {}", e)))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ChatError::Upstream {
                stage: UpstreamStage::VectorIndex,
                status: status.as_u16(),
                body,
            })
        }
    }
}
