//! `HostScanner`: one hypervisor host and everything it runs
//!
//! Only two failures end a host scan early: a rejected login and a missing
//! node topology. Everything else degrades the host's results and is logged.

use std::net::Ipv4Addr;

use infrascan_api::{
    GuestKind, GuestRecord, HostSnapshot, NetworkInterfaceRecord, ResourceUsage, ScanComponent,
    ScanDataset, StorageRecord,
};
use infrascan_client::ManagementApi;
use infrascan_exec::CredentialChain;
use infrascan_inventory::GuestAddressResolver;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::HypervisorConfig;
use crate::scan::ScanContext;
use crate::value::{
    f64_field, flag_field, list_field, opt_str_field, str_field, u32_field, u64_field,
};

/// Reports the running kernel release
pub const KERNEL_CMD: &str = "uname -r";

const UNKNOWN: &str = "unknown";

/// Scans a single hypervisor host
pub struct HostScanner {
    ctx: ScanContext,
    host: HypervisorConfig,
}

/// A running guest eligible for a workload scan
struct RunningGuest {
    vmid: u32,
    address: Ipv4Addr,
}

impl HostScanner {
    #[must_use]
    pub fn new(ctx: ScanContext, host: HypervisorConfig) -> Self {
        Self { ctx, host }
    }

    /// Address of the scanned host
    #[must_use]
    pub fn address(&self) -> &str {
        &self.host.address
    }

    /// Collect everything reachable on this host
    ///
    /// Never fails; problems end up in the run's error log.
    #[instrument(skip(self), fields(host = %self.host.address))]
    pub async fn scan(&self) -> ScanDataset {
        let mut dataset = ScanDataset::new();
        let address = self.host.address.as_str();
        let log = &self.ctx.log;
        let options = &self.ctx.config.options;

        info!("scanning hypervisor host");

        let api = match self
            .ctx
            .backend
            .connect_hypervisor(&self.host, options.trust)
            .await
        {
            Ok(api) => api,
            Err(e) => {
                let message = if e.is_auth_failure() {
                    format!("authentication failed for {address}: {e}")
                } else {
                    format!("authentication failed for {address}, API unreachable: {e}")
                };
                log.record(Some(address), ScanComponent::AuthError, message);
                return dataset;
            }
        };

        let version = match api.get("/version").await {
            Ok(data) => opt_str_field(&data, "version").unwrap_or_else(|| UNKNOWN.to_string()),
            Err(e) => {
                debug!(error = %e, "version query failed");
                UNKNOWN.to_string()
            }
        };

        let node = match api.get("/nodes").await {
            Ok(nodes) => match first_node(nodes) {
                Some(node) => node,
                None => {
                    log.record(
                        Some(address),
                        ScanComponent::Topology,
                        format!("no nodes reported by {address}"),
                    );
                    return dataset;
                }
            },
            Err(e) => {
                log.record(
                    Some(address),
                    ScanComponent::Topology,
                    format!("failed to get nodes from {address}: {e}"),
                );
                return dataset;
            }
        };

        let mut snapshot = host_snapshot(address, &node, &version);
        let node_name = snapshot.node_name.clone();

        let shell = self.ctx.login_chain(address);
        snapshot.kernel_version = self.kernel_version(&shell).await;
        dataset.hosts.push(snapshot);

        let resources = match api.get("/cluster/resources").await {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => Vec::new(),
            Err(e) => {
                log.record(
                    Some(address),
                    ScanComponent::Resources,
                    format!("failed to get resources from {address}: {e}"),
                );
                Vec::new()
            }
        };

        let running = self
            .classify_resources(api.as_ref(), &node_name, &resources, &mut dataset)
            .await;

        if options.scan_network {
            dataset.network = self.network_interfaces(api.as_ref(), &node_name).await;
        }

        if options.scan_containers {
            let workloads = self
                .ctx
                .collect_workloads(&shell, ScanComponent::Container)
                .await;
            dataset.workloads.extend(workloads);

            if options.scan_guests {
                for guest in &running {
                    let guest_address = guest.address.to_string();
                    if let Some(reason) = options.skip_reason(&guest_address) {
                        info!(
                            guest = %guest_address,
                            vmid = guest.vmid,
                            reason = %reason,
                            "skipping container scan"
                        );
                        continue;
                    }
                    let chain = self.ctx.login_chain(&guest_address);
                    let workloads = self
                        .ctx
                        .collect_workloads(&chain, ScanComponent::Container)
                        .await;
                    chain.close().await;
                    dataset.workloads.extend(workloads);
                }
            }
        }
        shell.close().await;

        info!(
            guests = dataset.guests.len(),
            workloads = dataset.workloads.len(),
            storage = dataset.storage.len(),
            interfaces = dataset.network.len(),
            "host scan finished"
        );

        dataset
    }

    async fn kernel_version(&self, shell: &CredentialChain) -> Option<String> {
        match shell.run(KERNEL_CMD).await {
            Ok(release) if !release.is_empty() => Some(release),
            Ok(_) => None,
            Err(e) => {
                self.ctx.log.record(
                    Some(self.address()),
                    ScanComponent::RemoteExec,
                    e.to_string(),
                );
                None
            }
        }
    }

    /// Turn resource entries into guest and storage records
    ///
    /// Returns the running guests that have a resolved address, in listing order.
    async fn classify_resources(
        &self,
        api: &dyn ManagementApi,
        node_name: &str,
        resources: &[Value],
        dataset: &mut ScanDataset,
    ) -> Vec<RunningGuest> {
        let resolver = GuestAddressResolver::new(api);
        let address = self.address();
        let mut running = Vec::new();

        for entry in resources {
            let kind = match str_field(entry, "type") {
                "qemu" => GuestKind::Vm,
                "lxc" => GuestKind::Container,
                "storage" => {
                    dataset.storage.push(storage_record(address, node_name, entry));
                    continue;
                }
                _ => continue,
            };

            let mut guest = guest_record(kind, address, node_name, entry);
            guest.ip_address = resolver
                .resolve(&guest.node_name, kind, guest.vmid)
                .await;

            if guest.is_running()
                && let Some(ip) = guest.ip_address
            {
                running.push(RunningGuest {
                    vmid: guest.vmid,
                    address: ip,
                });
            }
            dataset.guests.push(guest);
        }

        running
    }

    async fn network_interfaces(
        &self,
        api: &dyn ManagementApi,
        node_name: &str,
    ) -> Vec<NetworkInterfaceRecord> {
        let address = self.address();
        match api.get(&format!("/nodes/{node_name}/network")).await {
            Ok(Value::Array(interfaces)) => interfaces
                .iter()
                .map(|iface| interface_record(address, node_name, iface))
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                self.ctx.log.record(
                    Some(address),
                    ScanComponent::Network,
                    format!("failed to get network interfaces from {address}: {e}"),
                );
                Vec::new()
            }
        }
    }
}

/// First node of a topology listing
///
/// Single-node installations may answer with the node object itself.
fn first_node(nodes: Value) -> Option<Value> {
    match nodes {
        Value::Array(list) => list.into_iter().next(),
        Value::Object(map) if !map.is_empty() => Some(Value::Object(map)),
        _ => None,
    }
}

fn usage(entry: &Value) -> ResourceUsage {
    ResourceUsage {
        cpu_count: u32_field(entry, "maxcpu"),
        cpu_usage: f64_field(entry, "cpu"),
        mem_total: u64_field(entry, "maxmem"),
        mem_used: u64_field(entry, "mem"),
        disk_total: u64_field(entry, "maxdisk"),
        disk_used: u64_field(entry, "disk"),
    }
}

fn host_snapshot(address: &str, node: &Value, version: &str) -> HostSnapshot {
    let node_name = opt_str_field(node, "node").unwrap_or_else(|| UNKNOWN.to_string());
    HostSnapshot {
        address: address.to_string(),
        hostname: node_name.clone(),
        version: version.to_string(),
        node_name,
        status: opt_str_field(node, "status").unwrap_or_else(|| UNKNOWN.to_string()),
        uptime_seconds: u64_field(node, "uptime"),
        usage: usage(node),
        kernel_version: None,
    }
}

fn guest_record(kind: GuestKind, address: &str, node_name: &str, entry: &Value) -> GuestRecord {
    GuestRecord {
        kind,
        host_address: address.to_string(),
        node_name: opt_str_field(entry, "node").unwrap_or_else(|| node_name.to_string()),
        vmid: u32_field(entry, "vmid"),
        name: str_field(entry, "name").to_string(),
        status: str_field(entry, "status").to_string(),
        tags: list_field(entry, "tags", &[';', ',']),
        is_template: flag_field(entry, "template"),
        usage: usage(entry),
        disk_read: u64_field(entry, "diskread"),
        disk_write: u64_field(entry, "diskwrite"),
        net_in: u64_field(entry, "netin"),
        net_out: u64_field(entry, "netout"),
        uptime_seconds: u64_field(entry, "uptime"),
        ip_address: None,
    }
}

fn storage_record(address: &str, node_name: &str, entry: &Value) -> StorageRecord {
    StorageRecord {
        host_address: address.to_string(),
        node_name: opt_str_field(entry, "node").unwrap_or_else(|| node_name.to_string()),
        name: str_field(entry, "storage").to_string(),
        backend_type: str_field(entry, "plugintype").to_string(),
        content: list_field(entry, "content", &[',']),
        total_bytes: u64_field(entry, "maxdisk"),
        used_bytes: u64_field(entry, "disk"),
        shared: flag_field(entry, "shared"),
        status: str_field(entry, "status").to_string(),
    }
}

fn interface_record(address: &str, node_name: &str, iface: &Value) -> NetworkInterfaceRecord {
    NetworkInterfaceRecord {
        host_address: address.to_string(),
        host_name: node_name.to_string(),
        name: str_field(iface, "iface").to_string(),
        address: opt_str_field(iface, "address").or_else(|| opt_str_field(iface, "cidr")),
        kind: str_field(iface, "type").to_string(),
        active: flag_field(iface, "active"),
        bridge_ports: opt_str_field(iface, "bridge_ports"),
    }
}
