
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::{ChatError, Result, UpstreamStage};

/// Client for an OpenAI-compatible embeddings and chat-completions API.
///
/// Failures are not retried; a non-success response surfaces immediately as
/// [`ChatError::Upstream`] carrying the upstream status and body.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_base: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_base = Url::parse(&config.openai.api_base)
            .map_err(|e| ChatError::Config(format!("Invalid OpenAI API base: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            api_base,
            api_key: config.openai.api_key.clone(),
            embedding_model: config.openai.embedding_model.clone(),
            chat_model: config.openai.chat_model.clone(),
            client,
        })
    }

    /// Embed a single text into a fixed-length vector.
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Embedding text (length: {})", text.len());

        let url = self.endpoint("embeddings")?;
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let body = Self::check_status(response, UpstreamStage::Embedding).await?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body).map_err(|e| {
            ChatError::Network(format!("Failed to parse embedding response: {}", e))
        })?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ChatError::Network("Embedding response had no data".to_string()))?;

        debug!("Embedding has {} dimensions", vector.len());
        Ok(vector)
    }

    /// Send the system policy plus the user exchange to the chat-completions
    /// endpoint. Returns the first completion's text, or an empty string when
    /// the service returns no content.
    #[inline]
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!("Requesting chat completion ({} model)", self.chat_model);

        let url = self.endpoint("chat/completions")?;
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let body = Self::check_status(response, UpstreamStage::Generation).await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            ChatError::Network(format!("Failed to parse completion response: {}", e))
        })?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(answer)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // api_base may carry a path segment (e.g. /v1), so join relative to a
        // trailing-slash form of it.
        let base = if self.api_base.path().ends_with('/') {
            self.api_base.clone()
        } else {
            Url::parse(&format!("{}/", self.api_base))
                .map_err(|e| ChatError::Config(format!("Invalid OpenAI API base: {}", e)))?
        };
        base.join(path)
            .map_err(|e| ChatError::Config(format!("Failed to build OpenAI URL: {}", e)))
    }

    async fn check_status(response: reqwest::Response, stage: UpstreamStage) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(ChatError::Upstream {
                stage,
                status: status.as_u16(),
                body,
            })
        }
    }
}
