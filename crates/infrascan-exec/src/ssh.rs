//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::RemoteExecutor;

/// How server host keys are verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Accept any host key without verification (like `StrictHostKeyChecking=no`)
    #[default]
    AcceptAny,
    /// Only accept keys already present in the user's `known_hosts`
    KnownHosts,
}

impl HostKeyPolicy {
    /// Map the boolean configuration flag onto a policy
    #[must_use]
    pub fn from_accept_unknown(accept_unknown: bool) -> Self {
        if accept_unknown {
            HostKeyPolicy::AcceptAny
        } else {
            HostKeyPolicy::KnownHosts
        }
    }
}

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.policy {
            HostKeyPolicy::AcceptAny => Ok(true),
            HostKeyPolicy::KnownHosts => {
                match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
                    Ok(known) => Ok(known),
                    Err(e) => {
                        warn!(host = %self.host, error = %e, "known_hosts lookup failed");
                        Ok(false)
                    }
                }
            }
        }
    }
}

/// SSH command executor
///
/// Authenticates with a password. The session is established on first use
/// and reused for later commands until it fails or is disconnected.
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Host key verification policy
    policy: HostKeyPolicy,
    /// SSH session (initialized on first use)
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// No connection is made until the first command runs.
    #[must_use]
    pub fn new(conn_info: ConnectionInfo, policy: HostKeyPolicy) -> Self {
        Self {
            conn_info,
            policy,
            session: Mutex::new(None),
        }
    }

    /// Get connection info
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    /// Connect and authenticate if no session exists yet
    #[instrument(skip(self), fields(host = %self.conn_info.host, user = %self.conn_info.user))]
    async fn connect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if session_lock.is_some() {
            return Ok(());
        }

        debug!(port = self.conn_info.port, "connecting to SSH");

        let config = Arc::new(client::Config::default());
        let handler = SshClientHandler {
            host: self.conn_info.host.clone(),
            port: self.conn_info.port,
            policy: self.policy,
        };

        let mut session = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            russh::Error::UnknownKey => ExecError::HostKeyRejected(self.conn_info.host.clone()),
            other => ExecError::ConnectionFailed(other.to_string()),
        })?;

        let auth_res = session
            .authenticate_password(&self.conn_info.user, &self.conn_info.password)
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "password rejected for {}@{}",
                self.conn_info.user, self.conn_info.host
            )));
        }

        info!("SSH connected and authenticated");

        *session_lock = Some(session);
        Ok(())
    }

    /// Execute command on remote host
    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn execute_remote(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let mut session_lock = self.session.lock().await;

        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        debug!(command = %cmd, "executing remote command");

        let start = Instant::now();

        let mut channel = match session.channel_open_session().await {
            Ok(channel) => channel,
            Err(e) => {
                // Stale session, reconnect on next use
                *session_lock = None;
                return Err(ExecError::IoError(e.to_string()));
            }
        };

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = exit_status.cast_signed();
                }
                Some(ChannelMsg::Eof) | None => break,
                _ => {}
            }
        }

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    /// Disconnect from remote host
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if disconnection fails
    pub async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            debug!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.connect().await?;
        self.execute_remote(cmd).await
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(command = %cmd, timeout = ?timeout_duration, "executing with timeout");

        // connection setup counts against the deadline
        let result = timeout(timeout_duration, async {
            self.connect().await?;
            self.execute_remote(cmd).await
        })
        .await;

        match result {
            Ok(Ok(cmd_result)) => Ok(cmd_result),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    command = %cmd,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }

    async fn close(&self) -> Result<(), ExecError> {
        self.disconnect().await
    }
}
