//! Transport factory used by the scanners

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use infrascan_client::{ClientError, HubApi, ManagementApi};
use infrascan_exec::{ConnectionInfo, RemoteExecutor};

use crate::config::{HubConfig, HypervisorConfig, TrustPolicy};

/// Creates the clients and executors a run talks through
///
/// Production code wires real HTTPS, SSH and process transports; tests
/// substitute scripted fakes.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// Log in to a hypervisor's management API
    async fn connect_hypervisor(
        &self,
        host: &HypervisorConfig,
        trust: TrustPolicy,
    ) -> Result<Arc<dyn ManagementApi>, ClientError>;

    /// Executor for one login on one remote machine
    fn remote_executor(&self, conn: ConnectionInfo, trust: TrustPolicy) -> Arc<dyn RemoteExecutor>;

    /// Client for one smart-home hub
    fn hub_client(&self, hub: &HubConfig, trust: TrustPolicy)
    -> Result<Arc<dyn HubApi>, ClientError>;

    /// Executor for commands on the collecting machine
    fn local_executor(&self) -> Arc<dyn RemoteExecutor>;

    /// Primary address of the collecting machine, if it can be determined
    fn local_address(&self) -> Option<Ipv4Addr>;
}
