//! Private REST client for the subscription control plane
//!
//! This crate provides a minimal JSON-over-HTTP client used to create, renew
//! and delete subscription resources. Callers depend on the [`RestApi`] trait
//! so the real HTTP transport can be swapped for a scripted fake in tests.

mod config;
mod error;

pub use config::RestConfig;
pub use error::RestError;

use async_trait::async_trait;
use reqwest::{header, Method};
use serde_json::Value;
use url::Url;

/// JSON request capability against the control plane
///
/// Paths are relative to the configured server URL (e.g. `/subscription`).
#[async_trait]
pub trait RestApi: Send + Sync {
    /// Send a POST with a JSON body and return the parsed JSON response
    async fn post(&self, path: &str, body: &Value) -> Result<Value, RestError>;

    /// Send a PUT with a JSON body and return the parsed JSON response
    async fn put(&self, path: &str, body: &Value) -> Result<Value, RestError>;

    /// Send a DELETE, discarding any response body
    async fn delete(&self, path: &str) -> Result<(), RestError>;
}

/// A minimal REST client backed by reqwest
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: RestConfig,
}

impl RestClient {
    /// Create a new REST client from the given configuration
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RestError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Resolve a request path against the server URL.
    ///
    /// The path is appended to the server URL rather than joined, so a base
    /// like `https://host/restapi/v1.0` keeps its own path prefix.
    pub fn url_for(&self, path: &str) -> Result<Url, RestError> {
        let base = self.config.server_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let full = format!("{}/{}", base, path);
        Url::parse(&full).map_err(|e| RestError::InvalidUrl(format!("{}: {}", full, e)))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, RestError> {
        let url = self.url_for(path)?;
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(header::ACCEPT, "application/json");

        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("{} {} failed: HTTP {}", method, path, status.as_u16());
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<Value, RestError> {
        let response = self.send(method, path, Some(body)).await?;
        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| RestError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RestApi for RestClient {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, RestError> {
        self.send_json(Method::POST, path, body).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, RestError> {
        self.send_json(Method::PUT, path, body).await
    }

    async fn delete(&self, path: &str) -> Result<(), RestError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }
}
