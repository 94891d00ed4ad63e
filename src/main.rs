mod cli;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    mediarelay::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => mediarelay::api::run(args.address).await?,
        Commands::Fetch(args) => cli::fetch(args).await?,
    }

    Ok(())
}
