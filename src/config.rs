//! API credentials loaded from the environment
//!
//! Reads `ZENDESK_API`, `ZENDESK_EMAIL` and `ZENDESK_TOKEN`. A `.env` file in the
//! working directory is honoured when present.

use reqwest::Url;
use std::fmt;
use tracing::debug;

/// Environment variable holding the API base URL
pub const ENV_API_URL: &str = "ZENDESK_API";

/// Environment variable holding the agent email
pub const ENV_EMAIL: &str = "ZENDESK_EMAIL";

/// Environment variable holding the API token
pub const ENV_TOKEN: &str = "ZENDESK_TOKEN";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required variable missing or empty
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    /// Base URL cannot be parsed
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending value
        url: String,
        /// Parser message
        reason: String,
    },
}

/// Account credentials, immutable once loaded
#[derive(Clone)]
pub struct ApiCredentials {
    base_url: Url,
    email: String,
    token: String,
}

impl ApiCredentials {
    /// Build credentials from explicit values
    ///
    /// The base URL gains a trailing `/` if it lacks one so that relative
    /// endpoint paths join under it rather than replacing its last segment.
    pub fn new(base_url: &str, email: &str, token: &str) -> Result<Self, ConfigError> {
        let base_url = base_url.trim();
        let email = email.trim();
        let token = token.trim();

        if base_url.is_empty() {
            return Err(ConfigError::Missing(ENV_API_URL));
        }
        if email.is_empty() {
            return Err(ConfigError::Missing(ENV_EMAIL));
        }
        if token.is_empty() {
            return Err(ConfigError::Missing(ENV_TOKEN));
        }

        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let parsed = Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            base_url: parsed,
            email: email.to_string(),
            token: token.to_string(),
        })
    }

    /// Load credentials from the process environment (and `.env`, if any)
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_ok() {
            debug!("Loaded variables from .env");
        }

        let read = |name: &'static str| std::env::var(name).map_err(|_| ConfigError::Missing(name));
        Self::new(&read(ENV_API_URL)?, &read(ENV_EMAIL)?, &read(ENV_TOKEN)?)
    }

    /// API base URL, always ending in `/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Agent email
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Basic-auth user name in the `{email}/token` form Zendesk expects
    pub fn basic_auth_user(&self) -> String {
        format!("{}/token", self.email)
    }

    /// API token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Resolve an endpoint path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ConfigError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }
}

// Keeps the token out of logs.
impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("base_url", &self.base_url.as_str())
            .field("email", &self.email)
            .field("token", &"***")
            .finish()
    }
}
