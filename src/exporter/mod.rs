//! Export orchestration
//!
//! # Overview
//!
//! [`orchestrator::ExportOrchestrator`] runs the stages of an export strictly in
//! order:
//!
//! 1. **Tickets**: incremental cursor export, resumed from its checkpoint
//! 2. **Ticket comments**: one record per ticket listed in `tickets.json`,
//!    skipping tickets already in the comments file
//! 3. **Users**: incremental cursor export, resumed from its checkpoint
//! 4. **Attachments**: every attachment referenced by exported comments
//! 5. **Snapshots**: views, triggers, macros, automations, settings and
//!    support addresses, rewritten in full
//!
//! Every stage produces a [`stage::StageReport`]; the run produces an
//! [`stage::ExportSummary`] written to `summary.json`.
//!
//! # Error Handling
//!
//! - Incremental stages: any error stops the run (a re-run resumes)
//! - Comments and attachments: per-item isolation, see [`crate::fetcher`]
//! - Snapshot stages: a failure is logged and the run continues, unless the
//!   error is always fatal or the policy is [`config::FailurePolicy::FailFast`]

pub mod config;
pub mod orchestrator;
pub mod progress;
pub mod stage;

pub use config::{ExportOptions, FailurePolicy, RetryPolicy};
pub use orchestrator::ExportOrchestrator;
pub use stage::{ExportSummary, Stage, StageReport, StageStatus};

use crate::client::{ErrorClass, HttpError};
use crate::config::ConfigError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::resume::ResumeError;

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP error outside any fetcher
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Resume state error
    #[error("resume error: {0}")]
    Resume(#[from] ResumeError),

    /// A stage failed and stopped the run
    #[error("stage '{stage}' failed: {source}")]
    StageFailed {
        /// Failing stage
        stage: Stage,
        /// Underlying error
        #[source]
        source: Box<ExportError>,
    },
}

impl ExportError {
    /// Classification of the underlying HTTP failure, if any
    pub fn class(&self) -> ErrorClass {
        match self {
            ExportError::Http(e) => e.class(),
            ExportError::Fetcher(e) => e.class(),
            ExportError::StageFailed { source, .. } => source.class(),
            _ => ErrorClass::Unclassified,
        }
    }

    /// Whether no failure policy may skip this error
    ///
    /// Local file and resume errors always are, as are authentication
    /// failures, an exhausted rate-limit budget and shutdown.
    pub fn is_always_fatal(&self) -> bool {
        match self {
            ExportError::Config(_)
            | ExportError::Output(_)
            | ExportError::Resume(_)
            | ExportError::Fetcher(FetcherError::Output(_))
            | ExportError::StageFailed { .. } => true,
            _ => self.class().is_always_fatal(),
        }
    }

    /// Whether the run stopped because shutdown was requested
    pub fn is_cancelled(&self) -> bool {
        self.class() == ErrorClass::Cancelled
    }
}
