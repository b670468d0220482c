//! Error types for the REST client

use thiserror::Error;

/// Errors that can occur while talking to the control plane
#[derive(Debug, Error)]
pub enum RestError {
    /// Network or HTTP transport error
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body, if any
        body: String,
    },

    /// The response body was not valid JSON
    #[error("JSON decoding error: {0}")]
    Decode(String),

    /// The server URL or request path could not be turned into a URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Client configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RestError {
    /// HTTP status carried by this error, if the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            RestError::Decode(error.to_string())
        } else {
            RestError::Network(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let error = RestError::Status {
            status: 404,
            body: "{\"errorCode\":\"SUB-404\"}".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 404: {\"errorCode\":\"SUB-404\"}");
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_non_status_errors_have_no_status() {
        assert_eq!(RestError::Network("refused".to_string()).status(), None);
        assert_eq!(RestError::Decode("eof".to_string()).status(), None);
        assert_eq!(
            RestError::Network("connection reset".to_string()).to_string(),
            "Network/HTTP error: connection reset"
        );
    }
}
