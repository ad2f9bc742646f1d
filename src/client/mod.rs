//! HTTP access to the Zendesk API
//!
//! [`RateLimitedClient`] wraps a [`Transport`] and owns the retry rules: HTTP 429
//! is retried after `retry-after` (bounded), network failures are retried with
//! exponential backoff, and every other non-200 status is returned to the
//! caller as [`HttpError::Status`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;

pub mod classify;
pub mod rate_limited;
pub mod transport;

pub use classify::{classify_status, ErrorClass};
pub use rate_limited::{parse_retry_after, RateLimitedClient};
pub use transport::ReqwestTransport;

/// HTTP client errors
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Network failure that outlived the retry budget
    #[error("network error for {url}: {message}")]
    Network {
        /// Request URL
        url: String,
        /// Underlying error
        message: String,
    },

    /// Status other than 200 or 429
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// HTTP 429 retry budget spent
    #[error("rate limit still in effect after {attempts} attempts for {url}")]
    RateLimitExhausted {
        /// Request URL
        url: String,
        /// Number of 429 responses received
        attempts: u32,
    },

    /// Body could not be decoded as the expected JSON
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder message
        message: String,
    },

    /// Body decoded but lacks required fields
    #[error("invalid response from {url}: {message}")]
    InvalidResponse {
        /// Request URL
        url: String,
        /// What was wrong
        message: String,
    },

    /// The underlying client could not be built
    #[error("HTTP client setup failed: {0}")]
    Setup(String),

    /// Shutdown requested while waiting
    #[error("request cancelled by shutdown")]
    Cancelled,
}

impl HttpError {
    /// Classification used for retry/skip/abort decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            HttpError::Network { .. } | HttpError::Decode { .. } => ErrorClass::TransientServer,
            HttpError::Status { status, .. } => classify_status(*status),
            HttpError::RateLimitExhausted { .. } => ErrorClass::RateLimited,
            HttpError::Cancelled => ErrorClass::Cancelled,
            HttpError::InvalidResponse { .. } | HttpError::Setup(_) => ErrorClass::Unclassified,
        }
    }

    /// HTTP status, when the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::RateLimitExhausted { .. } => Some(429),
            _ => None,
        }
    }

    /// Short machine-style code for error log lines
    pub fn code(&self) -> &'static str {
        match self {
            HttpError::Network { .. } => "ERR_NETWORK",
            HttpError::Status { status, .. } if (500..600).contains(status) => "ERR_BAD_RESPONSE",
            HttpError::Status { .. } => "ERR_BAD_REQUEST",
            HttpError::RateLimitExhausted { .. } => "ERR_RATE_LIMITED",
            HttpError::Decode { .. } | HttpError::InvalidResponse { .. } => "ERR_INVALID_BODY",
            HttpError::Setup(_) => "ERR_SETUP",
            HttpError::Cancelled => "ERR_CANCELLED",
        }
    }
}

/// Result type for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;

/// How the response body will be consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// JSON document
    Json,
    /// Raw bytes (attachments)
    Binary,
}

/// A GET request to issue, identical across retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// Absolute URL
    pub url: Url,
    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,
    /// Expected body kind
    pub mode: ResponseMode,
}

impl RequestSpec {
    /// JSON request without query parameters
    pub fn json(url: Url) -> Self {
        Self {
            url,
            query: Vec::new(),
            mode: ResponseMode::Json,
        }
    }

    /// Binary request without query parameters
    pub fn binary(url: Url) -> Self {
        Self {
            url,
            query: Vec::new(),
            mode: ResponseMode::Binary,
        }
    }

    /// Append a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A response as seen by the transport, before status handling
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `retry-after` header value
    pub retry_after: Option<String>,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self, url: &Url) -> HttpResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Network-level failures reported by a [`Transport`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Request or connect timeout
    #[error("timeout: {0}")]
    Timeout(String),

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Body could not be read to completion
    #[error("body read failed: {0}")]
    Body(String),

    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

/// Issues a single HTTP request; implemented over reqwest and by test doubles
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the request once and return whatever status the server sent
    async fn execute(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError>;
}
