//! Rate-limit aware request execution
//!
//! Retries on:
//! - HTTP 429, after `retry-after + 1` seconds (exponential backoff when the
//!   header is absent), up to `max_rate_limit_retries`
//! - Network failures (timeout, connection refused, truncated body), with
//!   exponential backoff, up to `max_network_retries`
//!
//! Every other non-200 status is returned immediately as [`HttpError::Status`].

use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{HttpError, HttpResponse, HttpResult, RequestSpec, Transport, TransportError};
use crate::exporter::config::{calculate_backoff, RetryPolicy, RETRY_AFTER_PADDING};
use crate::shutdown::{self, sleep_unless_shutdown, SharedShutdown};

/// HTTP client that transparently absorbs rate limiting
#[derive(Clone)]
pub struct RateLimitedClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    shutdown: Option<SharedShutdown>,
}

impl RateLimitedClient {
    /// Create a client over `transport`
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Attach a shutdown handle so backoff sleeps can be interrupted
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Retry budgets in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Shutdown handle in effect, if any
    pub fn shutdown(&self) -> Option<&SharedShutdown> {
        self.shutdown.as_ref()
    }

    /// Issue `request` until it yields HTTP 200 or a non-retryable outcome
    pub async fn send(&self, request: &RequestSpec) -> HttpResult<HttpResponse> {
        let url = request.url.to_string();
        let mut rate_limit_hits: u32 = 0;
        let mut network_failures: u32 = 0;

        loop {
            if self.shutdown_requested() {
                return Err(HttpError::Cancelled);
            }

            let response = match self.execute_unless_shutdown(request).await? {
                Ok(response) => response,
                Err(e) => {
                    network_failures += 1;
                    if network_failures > self.policy.max_network_retries {
                        return Err(HttpError::Network {
                            url,
                            message: e.to_string(),
                        });
                    }
                    let backoff = calculate_backoff(network_failures - 1);
                    warn!(
                        url = %url,
                        attempt = network_failures,
                        max_retries = self.policy.max_network_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Network error, retrying"
                    );
                    self.pause(backoff).await?;
                    continue;
                }
            };

            match response.status {
                200 => {
                    if rate_limit_hits > 0 || network_failures > 0 {
                        debug!(
                            url = %url,
                            rate_limit_hits,
                            network_failures,
                            "Request succeeded after retries"
                        );
                    }
                    return Ok(response);
                }
                429 => {
                    rate_limit_hits += 1;
                    if rate_limit_hits > self.policy.max_rate_limit_retries {
                        return Err(HttpError::RateLimitExhausted {
                            url,
                            attempts: rate_limit_hits,
                        });
                    }
                    let wait = match response.retry_after.as_deref().and_then(parse_retry_after) {
                        Some(delay) => delay + RETRY_AFTER_PADDING,
                        None => calculate_backoff(rate_limit_hits - 1),
                    };
                    warn!(
                        url = %url,
                        attempt = rate_limit_hits,
                        max_retries = self.policy.max_rate_limit_retries,
                        retry_after = response.retry_after.as_deref().unwrap_or("-"),
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited (429), waiting before retry"
                    );
                    self.pause(wait).await?;
                }
                status => {
                    return Err(HttpError::Status { status, url });
                }
            }
        }
    }

    /// GET a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, request: &RequestSpec) -> HttpResult<T> {
        let response = self.send(request).await?;
        response.json(&request.url)
    }

    /// GET a binary payload
    pub async fn get_bytes(&self, url: Url) -> HttpResult<Bytes> {
        let response = self.send(&RequestSpec::binary(url)).await?;
        Ok(response.body)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// One transport round trip, abandoned as soon as shutdown is requested
    async fn execute_unless_shutdown(
        &self,
        request: &RequestSpec,
    ) -> HttpResult<Result<HttpResponse, TransportError>> {
        match &self.shutdown {
            Some(shutdown) => tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => {
                    debug!(url = %request.url, "Shutdown requested, abandoning request");
                    Err(HttpError::Cancelled)
                }
                outcome = self.transport.execute(request) => Ok(outcome),
            },
            None => Ok(self.transport.execute(request).await),
        }
    }

    async fn pause(&self, duration: Duration) -> HttpResult<()> {
        if sleep_unless_shutdown(duration, self.shutdown.as_ref()).await {
            Ok(())
        } else {
            Err(HttpError::Cancelled)
        }
    }
}

/// Parse a `retry-after` header given in (possibly fractional) seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs(secs.ceil() as u64)),
        _ => None,
    }
}
