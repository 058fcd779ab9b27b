use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

/// Stage of the answer pipeline that performed an upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStage {
    Embedding,
    VectorIndex,
    Generation,
    Email,
}

impl std::fmt::Display for UpstreamStage {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            UpstreamStage::Embedding => write!(f, "Embedding"),
            UpstreamStage::VectorIndex => write!(f, "Vector index"),
            UpstreamStage::Generation => write!(f, "Chat completion"),
            UpstreamStage::Email => write!(f, "Email"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Field '{0}' is required.")]
    Validation(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{stage} request failed: {body}")]
    Upstream {
        stage: UpstreamStage,
        status: u16,
        body: String,
    },

    #[error("Download link has expired or is invalid.")]
    TokenExpired,

    #[error("Unknown file key: {0}")]
    UnknownFile(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod index;
pub mod ingest;
pub mod notify;
pub mod openai;
pub mod server;
pub mod tokens;
