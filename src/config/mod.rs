
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Timeout applied to every outbound HTTP call (embedding, index, generation,
/// email). The transport enforces nothing tighter on its own.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Immutable process configuration, constructed once at startup and shared by
/// reference with every component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Origin echoed in CORS headers; the widget is served from here.
    pub allowed_origin: String,
    /// Public base URL used when building download links in emails.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8787".to_string(),
            allowed_origin: "https://jofdavies.com".to_string(),
            public_base_url: "https://jofdavies.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for OpenAiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub api_base: String,
    /// Number of nearest neighbours requested on every query. Unified across
    /// call sites.
    pub top_k: u32,
    pub embedding_dimension: u32,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for IndexConfig {
    #[inline]
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8081".to_string(),
            top_k: 8,
            embedding_dimension: 1536,
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Site the source pages are fetched from.
    pub site_base_url: String,
    /// Page paths to ingest, in order.
    pub pages: Vec<String>,
    /// Upper bound on chunk size, in words.
    pub chunk_words: usize,
}

impl Default for IngestConfig {
    #[inline]
    fn default() -> Self {
        Self {
            site_base_url: "https://jofdavies.com".to_string(),
            pages: vec![
                "/about.html".to_string(),
                "/cv/cv-crm-data.html".to_string(),
                "/cv/cv-digital-marketing.html".to_string(),
                "/cv/cv-email-marketing.html".to_string(),
                "/cv/cv-video-production.html".to_string(),
                "/cv/cv-web-dev.html".to_string(),
                "/cv/cv-workflow-automation.html".to_string(),
            ],
            chunk_words: 700,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenConfig {
    /// Validity window for download tokens, in hours.
    pub ttl_hours: i64,
    /// Directory the protected files are served from.
    pub files_dir: PathBuf,
    /// Form key -> file name table for /api/request-pdf.
    pub files: BTreeMap<String, String>,
}

impl Default for TokenConfig {
    #[inline]
    fn default() -> Self {
        let mut files = BTreeMap::new();
        files.insert("cv".to_string(), "jof-davies-cv.pdf".to_string());
        Self {
            ttl_hours: 4,
            files_dir: PathBuf::from("files"),
            files,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub api_base: String,
    pub from_address: String,
    /// Recipient of first-download notifications.
    pub operator_address: String,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for EmailConfig {
    #[inline]
    fn default() -> Self {
        Self {
            api_base: "https://api.resend.com".to_string(),
            from_address: "downloads@jofdavies.com".to_string(),
            operator_address: "jof@jofdavies.com".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(u32),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk bound: {0} words (must be between 50 and 2000)")]
    InvalidChunkWords(usize),
    #[error("Invalid token TTL: {0} hours (must be between 1 and 168)")]
    InvalidTtl(i64),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("No pages configured for ingestion")]
    NoPages,
    #[error("No files configured for download")]
    NoFiles,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from `<config_dir>/config.toml`, falling back to
    /// defaults when the file does not exist. API keys are never read from the
    /// file; they come from the environment.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        config.openai.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        config.index.api_key = std::env::var("VECTOR_INDEX_API_KEY").unwrap_or_default();
        config.email.api_key = std::env::var("EMAIL_API_KEY").unwrap_or_default();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [
            &self.openai.api_base,
            &self.index.api_base,
            &self.email.api_base,
            &self.ingest.site_base_url,
            &self.server.public_base_url,
        ] {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }
        if self.openai.embedding_model.is_empty() {
            return Err(ConfigError::InvalidModel("embedding_model".to_string()));
        }
        if self.openai.chat_model.is_empty() {
            return Err(ConfigError::InvalidModel("chat_model".to_string()));
        }
        if !(1..=100).contains(&self.index.top_k) {
            return Err(ConfigError::InvalidTopK(self.index.top_k));
        }
        if !(64..=4096).contains(&self.index.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.index.embedding_dimension,
            ));
        }
        if !(50..=2000).contains(&self.ingest.chunk_words) {
            return Err(ConfigError::InvalidChunkWords(self.ingest.chunk_words));
        }
        if !(1..=168).contains(&self.tokens.ttl_hours) {
            return Err(ConfigError::InvalidTtl(self.tokens.ttl_hours));
        }
        if self.ingest.pages.is_empty() {
            return Err(ConfigError::NoPages);
        }
        if self.tokens.files.is_empty() {
            return Err(ConfigError::NoFiles);
        }
        Ok(())
    }

    /// Path of the sqlite database holding download tokens.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("tokens.db")
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            openai: OpenAiConfig::default(),
            index: IndexConfig::default(),
            ingest: IngestConfig::default(),
            tokens: TokenConfig::default(),
            email: EmailConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}
