
pub mod chunk;
pub mod extract;

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::index::{DocumentChunk, VectorIndexClient};
use crate::openai::OpenAiClient;
use crate::{ChatError, Result};

pub use chunk::{chunk_id, chunk_page, chunk_text};
pub use extract::extract_main_text;

/// Counters reported after a full ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub pages_processed: usize,
    pub chunks_upserted: usize,
}

/// Offline pipeline that turns configured source pages into indexed chunks.
/// Writes go through the same embed-and-upsert contract the live `/api/ingest`
/// endpoint exposes, so both paths stay idempotent by chunk id.
pub struct IngestPipeline {
    site_base_url: Url,
    pages: Vec<String>,
    chunk_words: usize,
    http: Client,
    openai: OpenAiClient,
    index: VectorIndexClient,
}

impl IngestPipeline {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let site_base_url = Url::parse(&config.ingest.site_base_url)
            .map_err(|e| ChatError::Config(format!("Invalid site base URL: {}", e)))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self {
            site_base_url,
            pages: config.ingest.pages.clone(),
            chunk_words: config.ingest.chunk_words,
            http,
            openai: OpenAiClient::new(config)?,
            index: VectorIndexClient::new(config)?,
        })
    }

    /// Ingest every configured page. Any page fetch failure aborts the whole
    /// run; partial corpora are not tolerated.
    #[inline]
    pub async fn run(&self) -> Result<IngestStats> {
        let mut stats = IngestStats::default();

        for page in &self.pages {
            info!("Ingesting {}", page);

            let html = self.fetch_page(page).await?;
            let text = extract_main_text(&html);
            let chunks = chunk_page(page, &text, self.chunk_words);

            debug!("Page {} produced {} chunks", page, chunks.len());

            for chunk in &chunks {
                ingest_chunk(&self.openai, &self.index, chunk).await?;
                stats.chunks_upserted += 1;
            }
            stats.pages_processed += 1;
        }

        info!(
            "Ingestion complete: {} pages, {} chunks",
            stats.pages_processed, stats.chunks_upserted
        );
        Ok(stats)
    }

    async fn fetch_page(&self, page: &str) -> Result<String> {
        let url = self
            .site_base_url
            .join(page.trim_start_matches('/'))
            .map_err(|e| ChatError::Config(format!("Invalid page path {}: {}", page, e)))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to fetch {}: {}", page, e)))?;

        if !response.status().is_success() {
            return Err(ChatError::Network(format!(
                "Failed to fetch {}: HTTP {}",
                page,
                response.status().as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ChatError::Network(format!("Failed to read {}: {}", page, e)))
    }
}

/// Embed one chunk and upsert it into the index. Shared by the offline
/// pipeline and the live ingest endpoint.
#[inline]
pub async fn ingest_chunk(
    openai: &OpenAiClient,
    index: &VectorIndexClient,
    chunk: &DocumentChunk,
) -> Result<u64> {
    let vector = openai.embed(&chunk.text).await?;
    index.upsert(chunk, &vector).await
}
