use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use mediarelay::artifacts::download_stem;
use mediarelay::config::Config;
use mediarelay::extraction::YtDlpExtractor;
use mediarelay::orchestrator::{DownloadOutcome, Orchestrator};
use mediarelay::strategy::Strategy;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser, Debug)]
#[command(name = "mediarelay")]
#[command(about = "Media retrieval relay", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP relay
    Server(ServerArgs),
    /// Download one URL locally and print the outcome as JSON
    Fetch(FetchArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (defaults to server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// Post URL to download
    pub url: String,

    /// Directory to write the file to (defaults to server.artifact_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Runs every configured fingerprint against `args.url`, without the remote
/// fallback
pub async fn fetch(args: FetchArgs) -> Result<(), AnyError> {
    let config = Config::load()?;
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| config.server.artifact_dir.clone());
    tokio::fs::create_dir_all(&output_dir).await?;

    let strategy = Strategy::from_config(&config.extractor)?;
    let request = strategy.request(&args.url)?;
    let extractor = Arc::new(YtDlpExtractor::from_config(&config.extractor, &output_dir));
    let orchestrator = Orchestrator::new(extractor, strategy.delay());

    info!(url = %request.url(), output = %output_dir.display(), "Fetching");
    let outcome = orchestrator
        .run(&request, &download_stem(Uuid::new_v4(), Utc::now()))
        .await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match outcome {
        DownloadOutcome::Success { .. } => Ok(()),
        _ => Err("download failed".into()),
    }
}
