use clap::{Parser, Subcommand};
use socialpulse_core::Window;
use socialpulse_pipeline::SocialPipeline;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "socialpulse-cli")]
#[command(about = "Social sentiment for a ticker or company name")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect, score, and aggregate posts about an instrument
    Query {
        /// Ticker (`AAPL`, `$aapl`) or company name (`Apple`)
        query: String,

        /// Collection window: 24h, 7d, or 1w
        #[arg(long, default_value = "24h")]
        window: Window,

        /// Skip every persistence call
        #[arg(long)]
        dry_run: bool,
    },
    /// Show which instrument a query resolves to
    Resolve { query: String },
    /// Report which sources and models are configured
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = socialpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Query { dry_run: true, .. } = cli.command {
        config.dry_run = true;
    }
    let pipeline = SocialPipeline::from_config(&config)?;
    tracing::debug!(sources = ?config.enabled_sources(), dry_run = config.dry_run, "pipeline ready");

    match cli.command {
        Commands::Query { query, window, .. } => {
            let result = pipeline.query(&query, window).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Resolve { query } => {
            let instrument = pipeline.resolve(&query).await?;
            println!("{}", serde_json::to_string_pretty(&instrument)?);
        }
        Commands::Health => {
            let report = pipeline.health().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
