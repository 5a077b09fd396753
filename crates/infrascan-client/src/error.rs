//! Error types for the REST clients

use thiserror::Error;

/// Errors that can occur when talking to a hypervisor or hub API
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Request timeout
    #[error("Request timed out")]
    Timeout,

    /// Credentials or token rejected
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// API returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from server
        message: String,
    },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Http(err)
        }
    }
}

impl ClientError {
    /// Whether the server rejected our credentials
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Auth(_) | ClientError::Api { status: 401, .. }
        )
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
