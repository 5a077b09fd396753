//! Error types for infrascan-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during remote execution
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials were rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server host key is not known and unknown keys are not accepted
    #[error("host key rejected for {0}")]
    HostKeyRejected(String),

    /// Command (including connection setup) timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Connection not established
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Whether a different login might succeed where this one failed
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ExecError::AuthenticationFailed(_))
    }
}
