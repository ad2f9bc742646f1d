//! Error classification for retry and skip decisions.
//!
//! Every [`HttpError`](super::HttpError) maps to exactly one [`ErrorClass`]. The
//! comment fetcher and the orchestrator decide between retry, skip and abort
//! by class only, never by inspecting messages.

/// Classification of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// HTTP 429 whose retry budget is spent
    RateLimited,
    /// HTTP 5xx, network failure or an undecodable body
    TransientServer,
    /// HTTP 404: the item no longer exists upstream
    ResourceGone,
    /// HTTP 401/403: credentials are wrong for the whole run
    Unauthorized,
    /// Shutdown requested while the request was pending
    Cancelled,
    /// Anything else
    Unclassified,
}

impl ErrorClass {
    /// Short description used in log lines
    pub fn description(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate limit exceeded",
            Self::TransientServer => "transient server or network error",
            Self::ResourceGone => "resource not found",
            Self::Unauthorized => "authentication failed",
            Self::Cancelled => "cancelled",
            Self::Unclassified => "unexpected error",
        }
    }

    /// Remediation hint printed with fatal errors
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::RateLimited => "Wait for the account's API quota to reset, then re-run",
            Self::TransientServer => "Zendesk may be degraded; re-run later to resume",
            Self::ResourceGone => "The item was deleted upstream; nothing to do",
            Self::Unauthorized => "Check ZENDESK_EMAIL, ZENDESK_TOKEN and the token's permissions",
            Self::Cancelled => "Re-run to resume from where the export stopped",
            Self::Unclassified => "Inspect errors.txt; re-run with --on-error best-effort to skip",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientServer)
    }

    /// Whether this class must abort the run regardless of failure policy
    pub fn is_always_fatal(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unauthorized | Self::Cancelled)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Classify a non-success HTTP status
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        401 | 403 => ErrorClass::Unauthorized,
        404 => ErrorClass::ResourceGone,
        429 => ErrorClass::RateLimited,
        500..=599 => ErrorClass::TransientServer,
        _ => ErrorClass::Unclassified,
    }
}
