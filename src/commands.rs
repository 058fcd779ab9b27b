use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::ingest::IngestPipeline;
use crate::server::run_server;

/// Start the HTTP server with the configuration found in `config_dir`.
#[inline]
pub async fn serve<P: AsRef<Path>>(config_dir: P) -> Result<()> {
    let config = Config::load(config_dir)?;
    info!("Starting profile-chat server");
    run_server(config).await
}

/// Run the offline ingestion pipeline over every configured source page.
#[inline]
pub async fn ingest_site<P: AsRef<Path>>(config_dir: P) -> Result<()> {
    let config = Config::load(config_dir)?;

    let pipeline = IngestPipeline::new(&config).context("Failed to build ingestion pipeline")?;
    let stats = pipeline.run().await.context("Ingestion run failed")?;

    println!(
        "Ingestion complete: {} pages, {} chunks upserted.",
        stats.pages_processed, stats.chunks_upserted
    );
    Ok(())
}

/// Print the effective configuration, secrets omitted.
#[inline]
pub fn show_config<P: AsRef<Path>>(config_dir: P) -> Result<()> {
    let config = Config::load(config_dir)?;

    println!("Server:");
    println!("  Bind address: {}", config.server.bind_address);
    println!("  Allowed origin: {}", config.server.allowed_origin);
    println!("  Public base URL: {}", config.server.public_base_url);
    println!("OpenAI:");
    println!("  API base: {}", config.openai.api_base);
    println!("  Embedding model: {}", config.openai.embedding_model);
    println!("  Chat model: {}", config.openai.chat_model);
    println!("Vector index:");
    println!("  API base: {}", config.index.api_base);
    println!("  Top K: {}", config.index.top_k);
    println!("  Dimension: {}", config.index.embedding_dimension);
    println!("Ingestion:");
    println!("  Site: {}", config.ingest.site_base_url);
    println!("  Pages: {}", config.ingest.pages.len());
    println!("  Chunk bound: {} words", config.ingest.chunk_words);
    println!("Tokens:");
    println!("  TTL: {} hours", config.tokens.ttl_hours);
    println!("  Files dir: {}", config.tokens.files_dir.display());
    for (key, file) in &config.tokens.files {
        println!("  {} -> {}", key, file);
    }
    println!("Email:");
    println!("  API base: {}", config.email.api_base);
    println!("  From: {}", config.email.from_address);
    println!("  Operator: {}", config.email.operator_address);

    Ok(())
}
