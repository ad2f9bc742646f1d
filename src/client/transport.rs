//! reqwest-backed [`Transport`]

use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{HttpError, HttpResponse, RequestSpec, ResponseMode, Transport, TransportError};
use crate::config::ApiCredentials;

const USER_AGENT: &str = concat!("zendesk-exporter/", env!("CARGO_PKG_VERSION"));

/// Transport that authenticates every request with the account's API token
pub struct ReqwestTransport {
    client: Client,
    auth_user: String,
    token: String,
}

impl ReqwestTransport {
    /// Build a transport with request and connect timeouts
    pub fn new(
        credentials: &ApiCredentials,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| HttpError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            auth_user: credentials.basic_auth_user(),
            token: credentials.token().to_string(),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError> {
        let accept = match request.mode {
            ResponseMode::Json => "application/json",
            ResponseMode::Binary => "*/*",
        };

        debug!(url = %request.url, params = request.query.len(), "GET");

        let response = self
            .client
            .get(request.url.clone())
            .query(&request.query)
            .basic_auth(&self.auth_user, Some(&self.token))
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
