mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use mediafetch::config::Config;
use mediafetch::metadata::MetadataCache;
use mediafetch::observability::{Metrics, init_tracing};
use mediafetch::worker::SystemRunner;
use mediafetch::worker::process::check_available;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => mediafetch::api::run(args.address).await?,
        Commands::Info(args) => info(&args.url).await?,
        Commands::Check => check().await?,
    }

    Ok(())
}

async fn info(url: &str) -> Result<(), AnyError> {
    let config = Config::load()?;
    let metrics = Arc::new(Metrics::new());
    let runner = Arc::new(SystemRunner::new(metrics.clone()));
    let cache = MetadataCache::new(runner, &config.downloader, 1, metrics);

    let metadata = cache.get(url).await?;
    println!("{}", serde_json::to_string_pretty(metadata.as_ref())?);
    Ok(())
}

async fn check() -> Result<(), AnyError> {
    let config = Config::load()?;
    let runner = SystemRunner::new(Arc::new(Metrics::new()));
    let executable = &config.downloader.executable;

    if check_available(&runner, executable, config.downloader.health_timeout()).await {
        println!("{executable}: available");
        Ok(())
    } else {
        Err(format!("{executable}: not available").into())
    }
}
