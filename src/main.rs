use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use profile_chat::commands::{ingest_site, serve, show_config};

#[derive(Parser)]
#[command(name = "profile-chat")]
#[command(about = "Retrieval-augmented chat about Jof Davies's professional background")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the token database
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Fetch, chunk, and index the configured source pages
    Ingest,
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(&cli.config_dir).await?,
        Commands::Ingest => ingest_site(&cli.config_dir).await?,
        Commands::Config => show_config(&cli.config_dir)?,
    }

    Ok(())
}
