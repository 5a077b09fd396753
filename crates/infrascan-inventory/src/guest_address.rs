//! Best-effort guest IPv4 discovery through the hypervisor API
//!
//! VMs are asked through their guest agent. Containers are looked up in their
//! declared network configuration first and in the live interface listing
//! second. Every failure along the way simply means "no address".

use std::net::Ipv4Addr;

use infrascan_api::GuestKind;
use infrascan_client::ManagementApi;
use serde_json::Value;
use tracing::{debug, instrument};

/// Resolves guest addresses for one hypervisor host
pub struct GuestAddressResolver<'a> {
    api: &'a dyn ManagementApi,
}

impl<'a> GuestAddressResolver<'a> {
    #[must_use]
    pub fn new(api: &'a dyn ManagementApi) -> Self {
        Self { api }
    }

    /// Primary IPv4 address of a guest, if any source reports one
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, node: &str, kind: GuestKind, vmid: u32) -> Option<Ipv4Addr> {
        let address = match kind {
            GuestKind::Vm => self.resolve_vm(node, vmid).await,
            GuestKind::Container => self.resolve_container(node, vmid).await,
        };
        debug!(node = %node, vmid, address = ?address, "guest address resolution finished");
        address
    }

    async fn resolve_vm(&self, node: &str, vmid: u32) -> Option<Ipv4Addr> {
        let segment = GuestKind::Vm.api_segment();
        let path = format!("/nodes/{node}/{segment}/{vmid}/agent/network-get-interfaces");
        match self.api.get(&path).await {
            Ok(data) => agent_ipv4(&data),
            Err(e) => {
                debug!(vmid, error = %e, "guest agent query failed");
                None
            }
        }
    }

    async fn resolve_container(&self, node: &str, vmid: u32) -> Option<Ipv4Addr> {
        let segment = GuestKind::Container.api_segment();
        let config_path = format!("/nodes/{node}/{segment}/{vmid}/config");
        match self.api.get(&config_path).await {
            Ok(config) => {
                if let Some(address) = configured_ipv4(&config) {
                    return Some(address);
                }
            }
            Err(e) => debug!(vmid, error = %e, "container config query failed"),
        }

        let interfaces_path = format!("/nodes/{node}/{segment}/{vmid}/interfaces");
        match self.api.get(&interfaces_path).await {
            Ok(interfaces) => interface_ipv4(&interfaces),
            Err(e) => {
                debug!(vmid, error = %e, "container interfaces query failed");
                None
            }
        }
    }
}

/// First non-loopback IPv4 address from a guest agent interface listing
///
/// Expects the agent payload `{"result": [{"name": .., "ip-addresses": [..]}]}`.
#[must_use]
pub fn agent_ipv4(data: &Value) -> Option<Ipv4Addr> {
    data.get("result")?
        .as_array()?
        .iter()
        .filter(|iface| iface.get("name").and_then(Value::as_str) != Some("lo"))
        .filter_map(|iface| iface.get("ip-addresses").and_then(Value::as_array))
        .flatten()
        .filter(|addr| addr.get("ip-address-type").and_then(Value::as_str) == Some("ipv4"))
        .filter_map(|addr| addr.get("ip-address").and_then(Value::as_str))
        .filter_map(|ip| ip.parse::<Ipv4Addr>().ok())
        .find(|ip| !ip.is_loopback())
}

/// First static IPv4 address declared on a `netN` key of a container config
///
/// Values look like `name=eth0,bridge=vmbr0,ip=10.0.0.5/24,type=veth`;
/// `ip=dhcp` and empty assignments are skipped.
#[must_use]
pub fn configured_ipv4(config: &Value) -> Option<Ipv4Addr> {
    config
        .as_object()?
        .iter()
        .filter(|(key, _)| is_net_key(key))
        .filter_map(|(_, value)| value.as_str())
        .find_map(static_ip_assignment)
}

fn is_net_key(key: &str) -> bool {
    key.strip_prefix("net")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn static_ip_assignment(net: &str) -> Option<Ipv4Addr> {
    net.split(',')
        .filter_map(|part| part.trim().strip_prefix("ip="))
        .map(strip_cidr)
        .filter(|ip| !ip.is_empty() && *ip != "dhcp")
        .find_map(|ip| ip.parse().ok())
}

/// First non-loopback `inet` address from a live container interface listing
#[must_use]
pub fn interface_ipv4(interfaces: &Value) -> Option<Ipv4Addr> {
    interfaces
        .as_array()?
        .iter()
        .filter(|iface| iface.get("name").and_then(Value::as_str) != Some("lo"))
        .filter_map(|iface| iface.get("inet").and_then(Value::as_str))
        .map(strip_cidr)
        .filter_map(|ip| ip.parse::<Ipv4Addr>().ok())
        .find(|ip| !ip.is_loopback())
}

fn strip_cidr(addr: &str) -> &str {
    addr.split('/').next().unwrap_or(addr).trim()
}
