use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use housing_vol::apis::ParclLabsClient;
use housing_vol::chart::write_chart;
use housing_vol::config::{api_key_from_env, Config};
use housing_vol::constants::DEFAULT_CONFIG_PATH;
use housing_vol::pipeline::{Pipeline, PipelineOptions, PipelineOutput};
use housing_vol::types::MarketDataApi;
use housing_vol::{logging, observability, server};

#[derive(Parser)]
#[command(name = "housing_vol")]
#[command(about = "Housing market volatility chart from the Parcl Labs API")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the chart once, then serve it (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Build the chart and write it to disk without serving
    Render {
        /// Where to write the chart
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the pipeline and write the artifact; any failure here aborts startup
async fn build_chart(config: &Config) -> Result<PipelineOutput> {
    let api_key = api_key_from_env()?;
    let client = ParclLabsClient::new(&config.base_url, api_key, config.timeout())?;
    let api: Arc<dyn MarketDataApi> = Arc::new(client);

    let output = Pipeline::run(api, &config.selection, &PipelineOptions::from(config))
        .await
        .context("pipeline failed")?;

    for skipped in &output.skipped {
        warn!("Market {} left out of the chart: {}", skipped.parcl_id, skipped.reason);
    }

    write_chart(&output.table, &config.output_path)
        .with_context(|| format!("failed to write chart to {}", config.output_path.display()))?;
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    match &cli.command {
        Some(Commands::Serve { port: Some(port) }) => config.port = *port,
        Some(Commands::Render { output: Some(output) }) => config.output_path = output.clone(),
        _ => {}
    }

    let _log_guard = logging::init_logging(&config.log_dir);

    if let Some(addr) = config.metrics_addr.as_deref() {
        observability::init_metrics(addr)?;
    }

    info!("Building chart for {} selected markets", config.selection.len());
    let output = build_chart(&config).await?;
    println!(
        "📊 Chart written to {} ({} rows, {} markets, {} skipped)",
        config.output_path.display(),
        output.table.len(),
        output.table.markets().len(),
        output.skipped.len()
    );

    match cli.command {
        Some(Commands::Render { .. }) => Ok(()),
        _ => {
            println!("🚀 Serving chart on http://localhost:{}/", config.port);
            server::start_server(config.output_path.clone(), &config.bind_address, config.port)
                .await?;
            Ok(())
        }
    }
}
