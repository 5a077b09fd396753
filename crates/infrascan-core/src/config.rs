//! Configuration types for a scan

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Supplies the configuration for a run
pub trait ConfigProvider: Send + Sync {
    /// Load the scan configuration
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the configuration cannot be obtained.
    fn load_config(&self) -> Result<ScanConfig, CoreError>;
}

/// A credential that must not show up in logs
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Everything one run needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Hypervisor hosts to scan
    #[serde(default)]
    pub hypervisors: Vec<HypervisorConfig>,
    /// Shared remote-shell credentials for hosts and guests
    pub ssh: SshCredentials,
    /// Smart-home hubs to poll
    #[serde(default)]
    pub hubs: Vec<HubConfig>,
    #[serde(default)]
    pub options: ScanOptions,
}

/// Management API access for one hypervisor host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypervisorConfig {
    /// IP address or hostname
    pub address: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// API user including realm, e.g. `root@pam`
    pub user: String,
    pub password: Secret,
}

fn default_api_port() -> u16 {
    8006
}

/// Remote-shell logins tried in order on every machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshCredentials {
    pub username: String,
    /// Tried after `username` when it differs from it
    #[serde(default)]
    pub alt_username: Option<String>,
    pub password: Secret,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Per-command deadline, connection setup included
    #[serde(default = "default_ssh_timeout")]
    pub timeout_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_timeout() -> u64 {
    10
}

impl SshCredentials {
    /// Usernames in attempt order, without duplicates
    #[must_use]
    pub fn usernames(&self) -> Vec<&str> {
        let mut users = vec![self.username.as_str()];
        if let Some(alt) = self.alt_username.as_deref()
            && !alt.is_empty()
            && alt != self.username
        {
            users.push(alt);
        }
        users
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// URL scheme of a hub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubProtocol {
    #[default]
    Http,
    Https,
}

/// One smart-home hub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub address: String,
    #[serde(default = "default_hub_port")]
    pub port: u16,
    /// Long-lived bearer token
    pub token: Secret,
    #[serde(default)]
    pub protocol: HubProtocol,
}

fn default_hub_port() -> u16 {
    8123
}

impl HubConfig {
    /// Base URL of the hub's REST API
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = match self.protocol {
            HubProtocol::Http => "http",
            HubProtocol::Https => "https",
        };
        format!("{scheme}://{}:{}", self.address, self.port)
    }
}

/// Trust trade-offs for endpoints on a private network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    /// Skip TLS certificate verification (self-signed management endpoints)
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    /// Accept SSH host keys that are not in `known_hosts`
    #[serde(default = "default_true")]
    pub accept_unknown_host_keys: bool,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            accept_unknown_host_keys: true,
        }
    }
}

/// Switches and limits for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Collect host network interfaces
    #[serde(default = "default_true")]
    pub scan_network: bool,
    /// Collect container-engine workloads on hypervisor hosts
    #[serde(default = "default_true")]
    pub scan_containers: bool,
    /// Also collect workloads inside running guests
    #[serde(default = "default_true")]
    pub scan_guests: bool,
    /// Collect workloads on the collecting machine itself
    #[serde(default = "default_true")]
    pub scan_local_containers: bool,
    /// Guest addresses never scanned for workloads, with the reason
    #[serde(default)]
    pub skip_container_scan: HashMap<String, String>,
    /// Number of past runs the sink keeps
    #[serde(default = "default_max_old_scans")]
    pub max_old_scans: usize,
    /// Hosts scanned at the same time
    #[serde(default = "default_parallel_hosts")]
    pub max_parallel_hosts: usize,
    /// Address used to label local workloads instead of the detected one
    #[serde(default)]
    pub local_address: Option<Ipv4Addr>,
    #[serde(default, flatten)]
    pub trust: TrustPolicy,
}

fn default_true() -> bool {
    true
}

fn default_max_old_scans() -> usize {
    50
}

fn default_parallel_hosts() -> usize {
    1
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scan_network: true,
            scan_containers: true,
            scan_guests: true,
            scan_local_containers: true,
            skip_container_scan: HashMap::new(),
            max_old_scans: default_max_old_scans(),
            max_parallel_hosts: default_parallel_hosts(),
            local_address: None,
            trust: TrustPolicy::default(),
        }
    }
}

impl ScanOptions {
    /// Why container scanning is skipped for `address`, if it is
    #[must_use]
    pub fn skip_reason(&self, address: &str) -> Option<&str> {
        self.skip_container_scan.get(address).map(String::as_str)
    }
}
