//! Remote executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs shell commands on some machine
///
/// A successful return means the command was delivered and ran to completion;
/// a non-zero exit status is reported in the `CommandResult`, not as an error.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command without a deadline
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, failing with `ExecError::Timeout` once `timeout` elapses
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Short name of the transport, for logging
    fn executor_type(&self) -> &'static str;

    /// Release any open connection; the next command reconnects
    async fn close(&self) -> Result<(), ExecError> {
        Ok(())
    }
}
