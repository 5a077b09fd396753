//! Production transports: HTTPS management API, SSH, hub REST and local shell

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;

use async_trait::async_trait;
use infrascan_client::{ClientError, HubApi, HubClient, ManagementApi, PveClient};
use infrascan_core::{HubConfig, HypervisorConfig, ScanBackend, TrustPolicy};
use infrascan_exec::{ConnectionInfo, HostKeyPolicy, LocalExecutor, RemoteExecutor, SshExecutor};

/// Any routable address works; connecting a UDP socket sends nothing
const ROUTE_PROBE: &str = "192.0.2.1:9";

/// Default implementation of `ScanBackend`
pub struct DefaultBackend;

impl DefaultBackend {
    /// Create a new backend instance
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanBackend for DefaultBackend {
    async fn connect_hypervisor(
        &self,
        host: &HypervisorConfig,
        trust: TrustPolicy,
    ) -> Result<Arc<dyn ManagementApi>, ClientError> {
        let client = PveClient::login(
            &host.address,
            host.port,
            &host.user,
            host.password.expose(),
            trust.accept_invalid_certs,
        )
        .await?;
        Ok(Arc::new(client))
    }

    fn remote_executor(&self, conn: ConnectionInfo, trust: TrustPolicy) -> Arc<dyn RemoteExecutor> {
        let policy = HostKeyPolicy::from_accept_unknown(trust.accept_unknown_host_keys);
        Arc::new(SshExecutor::new(conn, policy))
    }

    fn hub_client(
        &self,
        hub: &HubConfig,
        trust: TrustPolicy,
    ) -> Result<Arc<dyn HubApi>, ClientError> {
        let client = HubClient::new(
            hub.base_url(),
            hub.token.expose(),
            trust.accept_invalid_certs,
        )?;
        Ok(Arc::new(client))
    }

    fn local_executor(&self) -> Arc<dyn RemoteExecutor> {
        Arc::new(LocalExecutor::new())
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        default_route_address()
    }
}

/// Source address the kernel would pick for outbound traffic
fn default_route_address() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(ROUTE_PROBE).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}
