//! Shell commands on the collecting machine

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::RemoteExecutor;

const DEFAULT_SHELL: &str = "sh";

/// Runs inventory commands locally with the same shell semantics as SSH
///
/// Commands get a C locale and no stdin, and are killed when their future
/// is dropped (for example on timeout).
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    shell: String,
}

impl LocalExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    /// Use another POSIX shell binary
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    #[instrument(skip(self), level = "debug")]
    async fn spawn_and_wait(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let started = Instant::now();

        let output = Command::new(&self.shell)
            .args(["-c", cmd])
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{}: {e}", self.shell)))?
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let result = CommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };

        debug!(status = result.status, duration = ?result.duration, "local command finished");
        Ok(result)
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.spawn_and_wait(cmd).await
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        tokio::time::timeout(timeout, self.spawn_and_wait(cmd))
            .await
            .unwrap_or_else(|_| {
                warn!(timeout = ?timeout, "local command timed out");
                Err(ExecError::Timeout { timeout })
            })
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
