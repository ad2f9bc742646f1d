//! Main entry point for the zendesk-exporter CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use zendesk_exporter::cli::Cli;
use zendesk_exporter::shutdown::{self, ShutdownCoordinator};

/// Initialize tracing subscriber with optional JSON formatting
///
/// Logs go to stderr; stdout carries only the run summary.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("zendesk_exporter=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - abandoning the current request, re-run to resume");
                shutdown.request_shutdown();
            }
        }
    });

    if let Err(e) = cli.execute(shutdown.clone()).await {
        let cancelled = e.is_cancelled();
        let suggestion = e.suggestion();
        let e = anyhow::Error::new(e);
        if cancelled {
            error!("Export interrupted, re-run to resume: {:#}", e);
        } else {
            error!("Export failed: {:#}", e);
        }
        if let Some(suggestion) = suggestion {
            eprintln!("Suggestion: {suggestion}");
        }
        std::process::exit(1);
    }
}
