//! Inventory record definitions

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::run::RunCounts;

// ============================================================================
// Hypervisor Hosts
// ============================================================================

/// CPU, memory and disk counters shared by hosts and guests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Allocated (guest) or physical (host) CPU count
    pub cpu_count: u32,
    /// Instantaneous CPU usage as a fraction of `cpu_count`
    pub cpu_usage: f64,
    /// Total memory in bytes
    pub mem_total: u64,
    /// Used memory in bytes
    pub mem_used: u64,
    /// Total disk in bytes
    pub disk_total: u64,
    /// Used disk in bytes
    pub disk_used: u64,
}

/// One hypervisor host's identity and aggregate usage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Address the host was scanned at
    pub address: String,
    pub hostname: String,
    /// Management stack version, `unknown` if it could not be fetched
    pub version: String,
    pub node_name: String,
    pub status: String,
    pub uptime_seconds: u64,
    #[serde(flatten)]
    pub usage: ResourceUsage,
    /// Kernel release, absent if the remote shell was unreachable
    pub kernel_version: Option<String>,
}

// ============================================================================
// Guests
// ============================================================================

/// Kind of guest managed by a hypervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestKind {
    /// Full virtual machine
    Vm,
    /// OS-level container
    Container,
}

impl GuestKind {
    /// Path segment used by the management API for this kind
    #[must_use]
    pub fn api_segment(self) -> &'static str {
        match self {
            GuestKind::Vm => "qemu",
            GuestKind::Container => "lxc",
        }
    }
}

impl fmt::Display for GuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestKind::Vm => write!(f, "vm"),
            GuestKind::Container => write!(f, "container"),
        }
    }
}

/// A VM or container guest of a hypervisor host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub kind: GuestKind,
    pub host_address: String,
    pub node_name: String,
    pub vmid: u32,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_template: bool,
    #[serde(flatten)]
    pub usage: ResourceUsage,
    /// Cumulative bytes read from disk
    pub disk_read: u64,
    /// Cumulative bytes written to disk
    pub disk_write: u64,
    /// Cumulative bytes received
    pub net_in: u64,
    /// Cumulative bytes sent
    pub net_out: u64,
    pub uptime_seconds: u64,
    /// Best-effort primary IPv4 address
    pub ip_address: Option<Ipv4Addr>,
}

impl GuestRecord {
    /// Whether the guest was running at scan time
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

// ============================================================================
// Workloads
// ============================================================================

/// Coarse state of a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkloadState {
    Running,
    Exited,
    Created,
    Paused,
    Restarting,
    Removing,
    Dead,
    /// Hub add-on with a pending update
    UpdateAvailable,
    /// Hub add-on reported as unavailable
    Unavailable,
    /// Anything the engine reports that is not listed above
    Other(String),
}

impl WorkloadState {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            WorkloadState::Running => "running",
            WorkloadState::Exited => "exited",
            WorkloadState::Created => "created",
            WorkloadState::Paused => "paused",
            WorkloadState::Restarting => "restarting",
            WorkloadState::Removing => "removing",
            WorkloadState::Dead => "dead",
            WorkloadState::UpdateAvailable => "update_available",
            WorkloadState::Unavailable => "unavailable",
            WorkloadState::Other(s) => s,
        }
    }
}

impl From<&str> for WorkloadState {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "running" => WorkloadState::Running,
            "exited" => WorkloadState::Exited,
            "created" => WorkloadState::Created,
            "paused" => WorkloadState::Paused,
            "restarting" => WorkloadState::Restarting,
            "removing" => WorkloadState::Removing,
            "dead" => WorkloadState::Dead,
            "update_available" => WorkloadState::UpdateAvailable,
            "unavailable" => WorkloadState::Unavailable,
            _ => WorkloadState::Other(value.to_string()),
        }
    }
}

impl From<String> for WorkloadState {
    fn from(value: String) -> Self {
        WorkloadState::from(value.as_str())
    }
}

impl From<WorkloadState> for String {
    fn from(value: WorkloadState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container-engine workload or hub add-on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    /// Address of the machine running the engine
    pub host_address: String,
    /// Display name of that machine
    pub host_name: String,
    pub workload_id: String,
    pub name: String,
    /// Image reference (or synthetic identifier for hub add-ons)
    pub image: String,
    /// Human readable status, e.g. `Up 3 hours`
    pub status: String,
    pub state: WorkloadState,
    pub ports: String,
    pub created_at: String,
    pub networks: String,
    pub mounts: String,
}

// ============================================================================
// Storage & Network
// ============================================================================

/// A storage pool on a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub host_address: String,
    pub node_name: String,
    pub name: String,
    /// Backend plugin type (dir, lvmthin, zfspool, nfs, ...)
    pub backend_type: String,
    /// Content classes (images, rootdir, backup, iso, ...)
    pub content: Vec<String>,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub shared: bool,
    pub status: String,
}

/// A network interface on a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceRecord {
    pub host_address: String,
    pub host_name: String,
    pub name: String,
    pub address: Option<String>,
    /// Interface type (eth, bridge, bond, vlan, ...)
    pub kind: String,
    pub active: bool,
    pub bridge_ports: Option<String>,
}

// ============================================================================
// Aggregate
// ============================================================================

/// Everything collected during one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanDataset {
    pub hosts: Vec<HostSnapshot>,
    pub guests: Vec<GuestRecord>,
    pub workloads: Vec<WorkloadRecord>,
    pub storage: Vec<StorageRecord>,
    pub network: Vec<NetworkInterfaceRecord>,
}

impl ScanDataset {
    /// Create an empty dataset
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move all records of `other` into this dataset
    pub fn merge(&mut self, other: ScanDataset) {
        self.hosts.extend(other.hosts);
        self.guests.extend(other.guests);
        self.workloads.extend(other.workloads);
        self.storage.extend(other.storage);
        self.network.extend(other.network);
    }

    /// Whether no record at all was collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
            && self.guests.is_empty()
            && self.workloads.is_empty()
            && self.storage.is_empty()
            && self.network.is_empty()
    }

    /// Count records per category
    #[must_use]
    pub fn counts(&self, errors: usize) -> RunCounts {
        let vms = self
            .guests
            .iter()
            .filter(|g| g.kind == GuestKind::Vm)
            .count();
        RunCounts {
            hosts: self.hosts.len(),
            vms,
            containers: self.guests.len() - vms,
            workloads: self.workloads.len(),
            errors,
        }
    }
}
