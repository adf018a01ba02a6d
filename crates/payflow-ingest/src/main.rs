//! Payflow Ingest - payment record ingestion daemon

use anyhow::{Context, Result};
use clap::Parser;
use payflow_common::logging::{init_logging, LogConfig, LogLevel};
use payflow_ingest::{Cli, IngestConfig, Orchestrator};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal;
use tracing::info;

/// Time given to blocking tasks (the console read) after the loop stops
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    // Make .env values visible to clap's env fallbacks
    payflow_ingest::config::load_dotenv();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("payflow-ingest")
        .build()
        .merge_env()?;

    let _logging = init_logging(&log_config)?;

    let config = cli.load_config().context("Invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("payflow-ingest")
        .build()
        .context("Failed to build async runtime")?;

    let result = runtime.block_on(run(config));

    // A pending stdin read cannot be interrupted; don't wait on it
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    result
}

async fn run(config: IngestConfig) -> Result<()> {
    info!("Starting Payflow ingest");

    let orchestrator = Orchestrator::new(config).context("Failed to start orchestrator")?;

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        token.cancel();
    });

    println!("Type 'exit' to stop.");
    let summary = orchestrator
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    info!(
        "Ingest stopped after {} cycles: {} files written, {} skipped, {} records",
        summary.cycles, summary.files_written, summary.files_skipped, summary.records_written
    );
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
