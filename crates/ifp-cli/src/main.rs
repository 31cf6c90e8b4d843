use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ifp_core::StateDirectory;
use ifp_fetch::FixtureDirFetcher;
use ifp_pipeline::{PipelineConfig, QueryPipeline};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ifp-cli")]
#[command(about = "Indian state fuel price scraper and query service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the JSON API (default).
    Serve,
    /// Query one state and print the result as JSON.
    Query {
        /// State name, e.g. "west bengal" or "tamil-nadu".
        state: String,
        /// Read saved pages from this directory instead of the network.
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// List the bundled state names and their slugs.
    States,
}

fn init_tracing() -> Result<()> {
    let level = std::env::var("IFP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("building log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => ifp_web::serve_from_env().await?,
        Commands::Query { state, fixtures } => {
            let config = PipelineConfig::from_env()?;
            let pipeline = match fixtures {
                Some(dir) => QueryPipeline::with_fetcher(config, Arc::new(FixtureDirFetcher::new(dir)))?,
                None => QueryPipeline::new(config)?,
            };
            let outcome = pipeline.query_state(&state).await?;
            for diagnostic in &outcome.diagnostics {
                eprintln!("diagnostic: {diagnostic}");
            }
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
        }
        Commands::States => {
            for (name, slug) in StateDirectory::bundled().iter() {
                println!("{name}\t{slug}");
            }
        }
    }

    Ok(())
}
