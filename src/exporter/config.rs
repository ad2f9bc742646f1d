//! Export configuration constants and run options

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Maximum number of retries after HTTP 429 before the run is aborted.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 10;

/// Maximum number of retries for network-level failures (timeouts, resets).
pub const MAX_NETWORK_RETRIES: u32 = 5;

/// Error budget for one ticket's comments; exceeding it skips the ticket.
pub const MAX_COMMENT_PAGE_ERRORS: u32 = 10;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30000;

/// Extra second added to the server's `retry-after` value.
pub const RETRY_AFTER_PADDING: Duration = Duration::from_secs(1);

/// Whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on pages per collection run.
pub const MAX_PAGES: usize = 100_000;

/// Default export directory
pub const DEFAULT_EXPORT_DIR: &str = "exported";

/// Calculate exponential backoff delay
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let factor = 2u64.checked_pow(retry_count).unwrap_or(u64::MAX);
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS);
    Duration::from_millis(delay_ms)
}

/// What to do with a per-item error that matches no known class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole run
    FailFast,
    /// Record the item in the error log and continue
    #[default]
    BestEffort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "best-effort" => Ok(FailurePolicy::BestEffort),
            _ => Err(format!(
                "Invalid failure policy: {s}. Valid options: fail-fast, best-effort"
            )),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Retry budgets for the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after HTTP 429
    pub max_rate_limit_retries: u32,
    /// Retries allowed after network failures
    pub max_network_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: MAX_RATE_LIMIT_RETRIES,
            max_network_retries: MAX_NETWORK_RETRIES,
        }
    }
}

/// Options for one export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Root of the export directory
    pub export_dir: PathBuf,
    /// Handling of unclassified per-item errors
    pub failure_policy: FailurePolicy,
    /// HTTP retry budgets
    pub retry: RetryPolicy,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            failure_policy: FailurePolicy::default(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
