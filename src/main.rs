//! FabWatch fabrication facility monitoring engine
//!
//! Reads formatted measurements from stdin (one JSON object per line,
//! either flat per-station objects or aggregator bundles), runs the
//! analysis engine, and publishes enriched results to stdout. Broker
//! subscription/publication is handled by the surrounding process
//! plumbing, e.g.:
//!
//! ```bash
//! mosquitto_sub -t reading/formatted | fabwatch | mosquitto_pub -l -t analysis/results
//! ```
//!
//! # Environment Variables
//!
//! - `FABWATCH_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fabwatch::acquisition::source::StdinSource;
use fabwatch::analysis::{AnalysisEngine, JsonLinePublisher};
use fabwatch::config::MonitorConfig;
use fabwatch::storage::CsvLogs;

#[derive(Parser, Debug)]
#[command(name = "fabwatch")]
#[command(about = "FabWatch fabrication facility monitoring engine")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides FABWATCH_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the CSV log files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => MonitorConfig::load(),
    };

    let logs = CsvLogs::create(&args.data_dir)
        .with_context(|| format!("creating log files in {}", args.data_dir.display()))?;
    info!(data_dir = %args.data_dir.display(), "Log files initialized");

    let engine = AnalysisEngine::new(config.clone(), logs);
    let mut source = StdinSource::new(config);
    let mut publisher = JsonLinePublisher::new();

    // Ctrl-C triggers a clean shutdown: stop accepting inbound messages,
    // finish in-flight work, abandon open anomaly windows.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Failed to install Ctrl-C handler");
            return;
        }
        info!("Ctrl-C received, shutting down");
        signal_cancel.cancel();
    });

    let stats = engine.run(&mut source, &mut publisher, cancel).await;
    info!(
        processed = stats.measurements_processed,
        anomalies = stats.anomalies_detected,
        "Engine stopped"
    );
    Ok(())
}
