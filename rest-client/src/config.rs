//! Configuration for the REST control-plane client

use std::time::Duration;
use url::Url;

use crate::RestError;

/// Connection settings for [`RestClient`](crate::RestClient)
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL every request path is appended to,
    /// e.g. `https://platform.example.com/restapi/v1.0`
    pub server_url: String,

    /// Bearer token sent in the `Authorization` header
    pub access_token: Option<String>,

    /// Per-request timeout
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl RestConfig {
    /// Create a configuration for the given server with default settings
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            access_token: None,
            timeout: Duration::from_secs(10),
            user_agent: format!("pushsub/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), RestError> {
        Url::parse(&self.server_url)
            .map_err(|e| RestError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;

        if self.timeout == Duration::ZERO {
            return Err(RestError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
