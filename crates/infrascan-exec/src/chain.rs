//! Credential fallback across several logins for one target

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::traits::RemoteExecutor;

/// Every candidate login failed for a target
#[derive(Error, Debug, Clone)]
#[error("remote execution on {target} failed (tried: {}): {last}", .tried.join(", "))]
pub struct ChainError {
    /// Target address
    pub target: String,
    /// Usernames attempted, in order
    pub tried: Vec<String>,
    /// Failure of the last attempt
    pub last: ExecError,
}

struct Candidate {
    user: String,
    executor: Arc<dyn RemoteExecutor>,
}

/// Ordered list of logins for a single target
///
/// Each command is attempted with every candidate in order until one of them
/// delivers it. Failures are aggregated into a single `ChainError`.
pub struct CredentialChain {
    target: String,
    timeout: Duration,
    candidates: Vec<Candidate>,
}

impl std::fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialChain")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .field("users", &self.users())
            .finish()
    }
}

impl CredentialChain {
    /// Create an empty chain for `target`
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
            candidates: Vec::new(),
        }
    }

    /// Append a candidate login
    #[must_use]
    pub fn with_candidate(
        mut self,
        user: impl Into<String>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Self {
        self.candidates.push(Candidate {
            user: user.into(),
            executor,
        });
        self
    }

    /// Target address
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Candidate usernames in attempt order
    #[must_use]
    pub fn users(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.user.as_str()).collect()
    }

    /// Run `cmd` with the first candidate that succeeds
    ///
    /// Returns the trimmed standard output of the winning attempt. The exit
    /// status of the command itself is not inspected.
    ///
    /// # Errors
    /// Returns a `ChainError` naming all attempted users if every candidate fails.
    #[instrument(skip(self, cmd), fields(target = %self.target))]
    pub async fn run(&self, cmd: &str) -> Result<String, ChainError> {
        let mut tried = Vec::with_capacity(self.candidates.len());
        let mut last = ExecError::ConfigError("no login candidates configured".to_string());

        for candidate in &self.candidates {
            tried.push(candidate.user.clone());
            match candidate
                .executor
                .run_with_timeout(cmd, self.timeout)
                .await
            {
                Ok(result) => return Ok(result.trimmed_stdout().to_string()),
                Err(e) => {
                    debug!(
                        user = %candidate.user,
                        rejected = e.is_auth_failure(),
                        error = %e,
                        "login candidate failed"
                    );
                    last = e;
                }
            }
        }

        Err(ChainError {
            target: self.target.clone(),
            tried,
            last,
        })
    }

    /// Close every candidate's connection once the target is done
    ///
    /// Close failures are logged and otherwise ignored.
    pub async fn close(&self) {
        for candidate in &self.candidates {
            if let Err(e) = candidate.executor.close().await {
                debug!(
                    target = %self.target,
                    user = %candidate.user,
                    error = %e,
                    "closing login candidate failed"
                );
            }
        }
    }
}
