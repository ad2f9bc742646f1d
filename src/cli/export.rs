//! Export command implementation

use crate::config::ApiCredentials;
use crate::exporter::config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_EXPORT_DIR, MAX_NETWORK_RETRIES, MAX_RATE_LIMIT_RETRIES,
};
use crate::exporter::{ExportOptions, ExportOrchestrator, ExportSummary, FailurePolicy, RetryPolicy};
use crate::output::OutputError;
use crate::shutdown::SharedShutdown;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::CliError;

/// Output format of the final summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Zendesk account exporter CLI
///
/// Credentials are read from `ZENDESK_API`, `ZENDESK_EMAIL` and
/// `ZENDESK_TOKEN` (a `.env` file in the working directory is honoured).
#[derive(Parser, Debug)]
#[command(name = "zendesk-exporter")]
#[command(about = "Export a Zendesk support account to local JSON files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory receiving the export
    #[arg(long, default_value = DEFAULT_EXPORT_DIR)]
    pub export_dir: PathBuf,

    /// What to do with an item error that is neither transient nor "not found":
    /// fail-fast or best-effort
    #[arg(long, default_value = "best-effort")]
    pub on_error: FailurePolicy,

    /// Retries allowed after HTTP 429 before the run stops (range: 1-100)
    #[arg(long, default_value_t = MAX_RATE_LIMIT_RETRIES, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub max_rate_limit_retries: u32,

    /// Retries allowed after network failures (range: 0-20)
    #[arg(long, default_value_t = MAX_NETWORK_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_network_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub request_timeout: u64,

    /// Output format of the final summary (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Options for the orchestrator
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            export_dir: self.export_dir.clone(),
            failure_policy: self.on_error,
            retry: RetryPolicy {
                max_rate_limit_retries: self.max_rate_limit_retries,
                max_network_retries: self.max_network_retries,
            },
            request_timeout: Duration::from_secs(self.request_timeout),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Run the export with credentials from the environment
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<ExportSummary, CliError> {
        let credentials = ApiCredentials::from_env()?;
        info!(account = %credentials.base_url(), email = credentials.email(), "Loaded credentials");

        let orchestrator =
            ExportOrchestrator::connect(credentials, self.export_options())?.with_shutdown(shutdown);
        let summary = orchestrator.run().await?;

        match self.output_format {
            OutputFormat::Json => output_json(&summary)?,
            OutputFormat::Human => output_human(&summary),
        }
        Ok(summary)
    }
}

fn output_json(summary: &ExportSummary) -> Result<(), CliError> {
    println!("{}", render_json(summary)?);
    Ok(())
}

fn render_json(summary: &ExportSummary) -> Result<String, OutputError> {
    serde_json::to_string_pretty(summary).map_err(|e| OutputError::SerializationError(e.to_string()))
}

fn output_human(summary: &ExportSummary) {
    println!("Export finished: {}", summary.export_dir);
    for report in &summary.stages {
        print!(
            "  {:<18} {:>8} written",
            report.stage.label(),
            report.records_written
        );
        if report.items_already_present > 0 {
            print!(", {} already present", report.items_already_present);
        }
        if report.items_skipped > 0 {
            print!(", {} skipped", report.items_skipped);
        }
        if let Some(failure) = &report.failure {
            print!(" (failed: {failure})");
        }
        println!();
    }
    println!(
        "Total: {} records written, {} skipped",
        summary.total_records(),
        summary.total_skipped()
    );
}
