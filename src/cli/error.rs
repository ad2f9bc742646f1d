//! CLI error types and conversions

use crate::client::ErrorClass;
use crate::config::ConfigError;
use crate::exporter::ExportError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),

    /// Export error
    #[error("export error: {0}")]
    ExportError(#[from] ExportError),

    /// Summary could not be rendered
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Whether the run stopped because shutdown was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CliError::ExportError(e) if e.is_cancelled())
    }

    /// Remediation hint for errors that came from the API
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::ExportError(e) if e.class() != ErrorClass::Unclassified => {
                Some(e.class().suggestion())
            }
            CliError::ConfigurationError(_) => {
                Some("Set ZENDESK_API, ZENDESK_EMAIL and ZENDESK_TOKEN (or add them to .env)")
            }
            _ => None,
        }
    }
}
