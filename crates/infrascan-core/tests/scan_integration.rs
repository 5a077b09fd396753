use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use infrascan_api::{GuestKind, RunId, ScanComponent, WorkloadState};
use infrascan_client::{ClientError, HubApi, HubEntityState, HubInstanceConfig, ManagementApi};
use infrascan_core::*;
use infrascan_exec::{CommandResult, ConnectionInfo, ExecError, RemoteExecutor};

// Mock implementations

struct FakeApi {
    responses: HashMap<String, Value>,
}

impl FakeApi {
    /// A single-node host with the given resource listing
    fn node(node: &str, resources: Value) -> Self {
        let mut responses = HashMap::new();
        responses.insert("/version".to_string(), json!({"version": "8.2.4"}));
        responses.insert(
            "/nodes".to_string(),
            json!([{
                "node": node, "status": "online", "uptime": 3600,
                "maxcpu": 8, "cpu": 0.05, "maxmem": 1024, "mem": 512,
                "maxdisk": 2048, "disk": 100
            }]),
        );
        responses.insert("/cluster/resources".to_string(), resources);
        responses.insert(
            format!("/nodes/{node}/network"),
            json!([
                {"iface": "vmbr0", "type": "bridge", "cidr": "10.0.0.2/24", "active": 1, "bridge_ports": "eno1"},
                {"iface": "eno1", "type": "eth", "active": 1}
            ]),
        );
        Self { responses }
    }

    fn with(mut self, path: &str, value: Value) -> Self {
        self.responses.insert(path.to_string(), value);
        self
    }

    fn without(mut self, path: &str) -> Self {
        self.responses.remove(path);
        self
    }
}

#[async_trait]
impl ManagementApi for FakeApi {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                status: 500,
                message: format!("no fixture for {path}"),
            })
    }
}

/// Hypervisor whose API handler panics mid-scan
struct PanicApi;

#[async_trait]
impl ManagementApi for PanicApi {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        panic!("unexpected response shape for {path}");
    }
}

fn agent_reply(ip: &str) -> Value {
    json!({"result": [
        {"name": "lo", "ip-addresses": [{"ip-address-type": "ipv4", "ip-address": "127.0.0.1"}]},
        {"name": "ens18", "ip-addresses": [{"ip-address-type": "ipv4", "ip-address": ip}]}
    ]})
}

/// How a machine answers on its remote shell
#[derive(Clone, Copy)]
enum Shell {
    /// Every login is rejected
    Down,
    /// Reachable, no container engine
    NoEngine,
    /// Reachable with a container engine
    Engine {
        listing: &'static str,
        hostname: &'static str,
    },
}

struct ShellExecutor {
    target: String,
    user: String,
    shell: Shell,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RemoteExecutor for ShellExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.target.clone(), self.user.clone()));

        let stdout = match self.shell {
            Shell::Down => {
                return Err(ExecError::AuthenticationFailed(format!(
                    "password rejected for {}",
                    self.user
                )));
            }
            _ if cmd == "uname -r" => "6.8.12-1-pve",
            Shell::NoEngine if cmd.starts_with("which docker") => "NO_DOCKER",
            Shell::Engine { .. } if cmd.starts_with("which docker") => "/usr/bin/docker\n27.1.1",
            Shell::Engine { listing, .. } if cmd.starts_with("docker ps") => listing,
            Shell::Engine { hostname, .. } if cmd == "hostname" => hostname,
            _ => "",
        };

        Ok(CommandResult {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(1),
        })
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        _timeout: Duration,
    ) -> Result<CommandResult, ExecError> {
        self.run(cmd).await
    }

    fn executor_type(&self) -> &'static str {
        "mock"
    }

    async fn close(&self) -> Result<(), ExecError> {
        self.closed.lock().unwrap().push(self.target.clone());
        Ok(())
    }
}

struct FakeHub {
    fail_states: bool,
    states: Vec<HubEntityState>,
}

#[async_trait]
impl HubApi for FakeHub {
    async fn config(&self) -> Result<HubInstanceConfig, ClientError> {
        Ok(HubInstanceConfig {
            location_name: Some("Home".to_string()),
            version: Some("2024.6.1".to_string()),
        })
    }

    async fn states(&self) -> Result<Vec<HubEntityState>, ClientError> {
        if self.fail_states {
            return Err(ClientError::Timeout);
        }
        Ok(self.states.clone())
    }
}

#[derive(Default)]
struct MockBackend {
    /// `None` means the login is rejected
    hypervisors: HashMap<String, Option<Arc<FakeApi>>>,
    panicking: Vec<String>,
    /// Keyed by (address, user); unknown logins are down
    shells: HashMap<(String, String), Shell>,
    hubs: HashMap<String, Arc<FakeHub>>,
    local: Option<Shell>,
    local_address: Option<Ipv4Addr>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    closed: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    fn host(mut self, address: &str, api: FakeApi) -> Self {
        self.hypervisors
            .insert(address.to_string(), Some(Arc::new(api)));
        self
    }

    fn panicking_host(mut self, address: &str) -> Self {
        self.panicking.push(address.to_string());
        self
    }

    fn rejecting_host(mut self, address: &str) -> Self {
        self.hypervisors.insert(address.to_string(), None);
        self
    }

    fn shell(mut self, address: &str, user: &str, shell: Shell) -> Self {
        self.shells
            .insert((address.to_string(), user.to_string()), shell);
        self
    }

    fn hub(mut self, address: &str, hub: FakeHub) -> Self {
        self.hubs.insert(address.to_string(), Arc::new(hub));
        self
    }

    fn attempts_on(&self, address: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target == address)
            .map(|(_, user)| user.clone())
            .collect()
    }

    fn closes_on(&self, address: &str) -> usize {
        self.closed
            .lock()
            .unwrap()
            .iter()
            .filter(|target| *target == address)
            .count()
    }
}

#[async_trait]
impl ScanBackend for MockBackend {
    async fn connect_hypervisor(
        &self,
        host: &HypervisorConfig,
        _trust: TrustPolicy,
    ) -> Result<Arc<dyn ManagementApi>, ClientError> {
        if self.panicking.contains(&host.address) {
            return Ok(Arc::new(PanicApi));
        }
        match self.hypervisors.get(&host.address) {
            Some(Some(api)) => Ok(Arc::clone(api) as Arc<dyn ManagementApi>),
            _ => Err(ClientError::Auth("authentication failure".to_string())),
        }
    }

    fn remote_executor(&self, conn: ConnectionInfo, _trust: TrustPolicy) -> Arc<dyn RemoteExecutor> {
        let shell = self
            .shells
            .get(&(conn.host.clone(), conn.user.clone()))
            .copied()
            .unwrap_or(Shell::Down);
        Arc::new(ShellExecutor {
            target: conn.host,
            user: conn.user,
            shell,
            calls: Arc::clone(&self.calls),
            closed: Arc::clone(&self.closed),
        })
    }

    fn hub_client(
        &self,
        hub: &HubConfig,
        _trust: TrustPolicy,
    ) -> Result<Arc<dyn HubApi>, ClientError> {
        self.hubs
            .get(&hub.address)
            .map(|h| Arc::clone(h) as Arc<dyn HubApi>)
            .ok_or_else(|| ClientError::InvalidResponse("unknown hub".to_string()))
    }

    fn local_executor(&self) -> Arc<dyn RemoteExecutor> {
        Arc::new(ShellExecutor {
            target: "local".to_string(),
            user: "local".to_string(),
            shell: self.local.unwrap_or(Shell::NoEngine),
            calls: Arc::clone(&self.calls),
            closed: Arc::clone(&self.closed),
        })
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.local_address
    }
}

struct StaticConfig(ScanConfig);

impl ConfigProvider for StaticConfig {
    fn load_config(&self) -> Result<ScanConfig, CoreError> {
        Ok(self.0.clone())
    }
}

struct BrokenConfig;

impl ConfigProvider for BrokenConfig {
    fn load_config(&self) -> Result<ScanConfig, CoreError> {
        Err(CoreError::Config("no configuration file found".to_string()))
    }
}

fn config(hosts: &[&str]) -> ScanConfig {
    ScanConfig {
        hypervisors: hosts
            .iter()
            .map(|address| HypervisorConfig {
                address: (*address).to_string(),
                port: 8006,
                user: "root@pam".to_string(),
                password: Secret::new("secret"),
            })
            .collect(),
        ssh: SshCredentials {
            username: "root".to_string(),
            alt_username: Some("admin".to_string()),
            password: Secret::new("pw"),
            port: 22,
            timeout_secs: 1,
        },
        hubs: Vec::new(),
        options: ScanOptions {
            scan_local_containers: false,
            ..ScanOptions::default()
        },
    }
}

fn hub_config(address: &str) -> HubConfig {
    HubConfig {
        address: address.to_string(),
        port: 8123,
        token: Secret::new("token"),
        protocol: HubProtocol::Http,
    }
}

fn entity(id: &str, state: &str, title: &str) -> HubEntityState {
    HubEntityState {
        entity_id: id.to_string(),
        state: state.to_string(),
        attributes: json!({"title": title, "installed_version": "1.0", "latest_version": "1.1"})
            .as_object()
            .cloned()
            .unwrap(),
    }
}

const LISTING: &str = concat!(
    r#"{"id":"a1","name":"web","image":"nginx","status":"Up 2 hours","state":"running"}"#,
    "\n",
    "not-json\n",
    r#"{"id":"b2","name":"db","image":"postgres","status":"Exited (0)","state":"exited"}"#,
);

async fn run(backend: MockBackend, config: ScanConfig) -> (ScanReport, Arc<MockBackend>) {
    let backend = Arc::new(backend);
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ScanOrchestrator::new(Arc::clone(&backend) as Arc<dyn ScanBackend>, sink);
    let report = orchestrator.run(&StaticConfig(config)).await.unwrap();
    (report, backend)
}

fn components(report: &ScanReport) -> Vec<ScanComponent> {
    report.errors.iter().map(|e| e.component).collect()
}

#[tokio::test]
async fn test_auth_failure_isolates_host() {
    let backend = MockBackend::default()
        .rejecting_host("10.0.0.2")
        .host("10.0.0.3", FakeApi::node("pve3", json!([])))
        .shell("10.0.0.3", "root", Shell::NoEngine);

    let (report, backend) = run(backend, config(&["10.0.0.2", "10.0.0.3"])).await;

    assert_eq!(components(&report), vec![ScanComponent::AuthError]);
    assert_eq!(report.errors[0].host_address.as_deref(), Some("10.0.0.2"));
    assert!(report.errors[0].message.contains("10.0.0.2"));

    assert!(report.dataset.hosts.iter().all(|h| h.address != "10.0.0.2"));
    assert!(report.dataset.network.iter().all(|n| n.host_address != "10.0.0.2"));
    assert!(backend.attempts_on("10.0.0.2").is_empty());

    assert_eq!(report.dataset.hosts.len(), 1);
    assert_eq!(report.dataset.hosts[0].node_name, "pve3");
    assert_eq!(report.counts().errors, 1);
}

#[tokio::test]
async fn test_topology_failure_ends_host_scan() {
    let api = FakeApi::node("pve", json!([])).without("/nodes");
    let backend = MockBackend::default().host("10.0.0.2", api);

    let (report, backend) = run(backend, config(&["10.0.0.2"])).await;

    assert_eq!(components(&report), vec![ScanComponent::Topology]);
    assert!(report.dataset.is_empty());
    assert!(backend.attempts_on("10.0.0.2").is_empty());
}

#[tokio::test]
async fn test_empty_node_list_ends_host_scan() {
    let api = FakeApi::node("pve", json!([])).with("/nodes", json!([]));
    let backend = MockBackend::default().host("10.0.0.2", api);

    let (report, _) = run(backend, config(&["10.0.0.2"])).await;

    assert_eq!(components(&report), vec![ScanComponent::Topology]);
    assert!(report.dataset.hosts.is_empty());
}

#[tokio::test]
async fn test_missing_version_and_resources_degrade() {
    let api = FakeApi::node("pve", json!([]))
        .without("/version")
        .without("/cluster/resources");
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine);

    let (report, _) = run(backend, config(&["10.0.0.2"])).await;

    assert_eq!(components(&report), vec![ScanComponent::Resources]);
    let host = &report.dataset.hosts[0];
    assert_eq!(host.version, "unknown");
    assert_eq!(host.kernel_version.as_deref(), Some("6.8.12-1-pve"));
    assert!(report.dataset.guests.is_empty());
    assert_eq!(report.dataset.network.len(), 2);
}

#[tokio::test]
async fn test_guests_storage_and_network_are_classified() {
    let resources = json!([
        {"type": "qemu", "vmid": 101, "name": "web", "status": "running", "tags": "prod;web", "maxcpu": 2},
        {"type": "lxc", "vmid": 200, "name": "dns", "status": "stopped"},
        {"type": "storage", "storage": "local-lvm", "plugintype": "lvmthin", "content": "images,rootdir", "shared": 0},
        {"type": "node", "node": "pve"}
    ]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.50"))
        .with("/nodes/pve/lxc/200/config", json!({"net0": "name=eth0,ip=10.0.0.60/24"}));
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine)
        .shell("10.0.0.50", "root", Shell::NoEngine);

    let (report, backend) = run(backend, config(&["10.0.0.2"])).await;

    assert!(report.errors.is_empty());
    let guests = &report.dataset.guests;
    assert_eq!(guests.len(), 2);
    assert_eq!(guests[0].kind, GuestKind::Vm);
    assert_eq!(guests[0].ip_address, Some(Ipv4Addr::new(10, 0, 0, 50)));
    assert_eq!(guests[0].tags, vec!["prod", "web"]);
    assert_eq!(guests[1].kind, GuestKind::Container);
    assert_eq!(guests[1].ip_address, Some(Ipv4Addr::new(10, 0, 0, 60)));

    assert_eq!(report.dataset.storage.len(), 1);
    assert_eq!(report.dataset.storage[0].content, vec!["images", "rootdir"]);
    assert_eq!(report.dataset.network[0].address.as_deref(), Some("10.0.0.2/24"));

    // the stopped container keeps its address but is never scanned
    assert_eq!(backend.attempts_on("10.0.0.50").len(), 1);
    assert!(backend.attempts_on("10.0.0.60").is_empty());

    let counts = report.counts();
    assert_eq!((counts.hosts, counts.vms, counts.containers), (1, 1, 1));
}

#[tokio::test]
async fn test_unreachable_guest_logs_one_error() {
    let resources = json!([{"type": "qemu", "vmid": 101, "name": "web", "status": "running"}]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.50"));
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine);

    let (report, backend) = run(backend, config(&["10.0.0.2"])).await;

    assert_eq!(components(&report), vec![ScanComponent::Container]);
    assert_eq!(report.errors[0].host_address.as_deref(), Some("10.0.0.50"));
    assert!(report.errors[0].message.contains("tried: root, admin"));
    assert_eq!(backend.attempts_on("10.0.0.50"), vec!["root", "admin"]);
    assert_eq!(report.dataset.guests.len(), 1);
}

#[tokio::test]
async fn test_alternate_login_is_used() {
    let backend = MockBackend::default()
        .host("10.0.0.2", FakeApi::node("pve", json!([])))
        .shell("10.0.0.2", "admin", Shell::NoEngine);

    let (report, _) = run(backend, config(&["10.0.0.2"])).await;

    assert!(report.errors.is_empty());
    assert_eq!(
        report.dataset.hosts[0].kernel_version.as_deref(),
        Some("6.8.12-1-pve")
    );
}

#[tokio::test]
async fn test_host_shell_down_keeps_snapshot() {
    let backend = MockBackend::default().host("10.0.0.2", FakeApi::node("pve", json!([])));

    let (report, _) = run(backend, config(&["10.0.0.2"])).await;

    assert_eq!(
        components(&report),
        vec![ScanComponent::RemoteExec, ScanComponent::Container]
    );
    assert_eq!(report.dataset.hosts.len(), 1);
    assert!(report.dataset.hosts[0].kernel_version.is_none());
}

#[tokio::test]
async fn test_skip_list_prevents_attempts() {
    let resources = json!([{"type": "qemu", "vmid": 101, "name": "appliance", "status": "running"}]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.30"));
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine);

    let mut config = config(&["10.0.0.2"]);
    config
        .options
        .skip_container_scan
        .insert("10.0.0.30".to_string(), "no shell on appliance".to_string());

    let (report, backend) = run(backend, config).await;

    assert!(report.errors.is_empty());
    assert!(backend.attempts_on("10.0.0.30").is_empty());
    assert_eq!(report.dataset.guests[0].ip_address, Some(Ipv4Addr::new(10, 0, 0, 30)));
}

#[tokio::test]
async fn test_guest_scan_disabled() {
    let resources = json!([{"type": "qemu", "vmid": 101, "name": "web", "status": "running"}]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.50"));
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine);

    let mut config = config(&["10.0.0.2"]);
    config.options.scan_guests = false;
    config.options.scan_network = false;

    let (report, backend) = run(backend, config).await;

    assert!(report.errors.is_empty());
    assert!(backend.attempts_on("10.0.0.50").is_empty());
    assert!(report.dataset.network.is_empty());
}

#[tokio::test]
async fn test_malformed_listing_line_is_logged() {
    let backend = MockBackend::default()
        .host("10.0.0.2", FakeApi::node("pve", json!([])))
        .shell(
            "10.0.0.2",
            "root",
            Shell::Engine {
                listing: LISTING,
                hostname: "pve",
            },
        );

    let (report, _) = run(backend, config(&["10.0.0.2"])).await;

    let ids: Vec<&str> = report
        .dataset
        .workloads
        .iter()
        .map(|w| w.workload_id.as_str())
        .collect();
    assert_eq!(ids, vec!["a1", "b2"]);
    assert_eq!(components(&report), vec![ScanComponent::ContainerParse]);
    assert_eq!(report.errors[0].detail.as_deref(), Some("not-json"));
}

#[tokio::test]
async fn test_hub_addons_and_failures() {
    let backend = MockBackend::default()
        .hub(
            "10.0.0.9",
            FakeHub {
                fail_states: false,
                states: vec![
                    entity("update.addon_foo_update", "on", "Foo"),
                    entity("update.device_firmware", "on", "Bulb"),
                ],
            },
        )
        .hub(
            "10.0.0.10",
            FakeHub {
                fail_states: true,
                states: vec![],
            },
        );

    let mut config = config(&[]);
    config.hubs = vec![hub_config("10.0.0.9"), hub_config("10.0.0.10"), hub_config("10.0.0.11")];

    let (report, _) = run(backend, config).await;

    assert_eq!(report.dataset.workloads.len(), 1);
    let addon = &report.dataset.workloads[0];
    assert_eq!(addon.host_name, "Home (HAOS)");
    assert_eq!(addon.state, WorkloadState::UpdateAvailable);
    assert_eq!(addon.status, "v1.0 -> 1.1");

    assert_eq!(
        components(&report),
        vec![ScanComponent::HubStates, ScanComponent::HubConfig]
    );
}

#[tokio::test]
async fn test_local_workloads_use_configured_address() {
    let mut backend = MockBackend::default();
    backend.local = Some(Shell::Engine {
        listing: r#"{"id":"c3","name":"scanner","state":"running"}"#,
        hostname: "collector",
    });
    backend.local_address = Some(Ipv4Addr::new(192, 168, 1, 5));

    let mut config = config(&[]);
    config.options.scan_local_containers = true;
    config.options.local_address = Some(Ipv4Addr::new(10, 0, 0, 99));

    let (report, _) = run(backend, config).await;

    assert!(report.errors.is_empty());
    let workload = &report.dataset.workloads[0];
    assert_eq!(workload.host_address, "10.0.0.99");
    assert_eq!(workload.host_name, "collector");
}

#[tokio::test]
async fn test_local_address_falls_back_to_detected() {
    let mut backend = MockBackend::default();
    backend.local = Some(Shell::Engine {
        listing: r#"{"id":"c3","name":"scanner","state":"running"}"#,
        hostname: "collector",
    });
    backend.local_address = Some(Ipv4Addr::new(192, 168, 1, 5));

    let mut config = config(&[]);
    config.options.scan_local_containers = true;

    let (report, _) = run(backend, config).await;

    assert_eq!(report.dataset.workloads[0].host_address, "192.168.1.5");
}

#[tokio::test]
async fn test_parallel_hosts_merge_in_config_order() {
    let mut backend = MockBackend::default();
    let hosts = ["10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"];
    for (i, host) in hosts.iter().enumerate() {
        backend = backend
            .host(host, FakeApi::node(&format!("pve{i}"), json!([])))
            .shell(host, "root", Shell::NoEngine);
    }

    let mut config = config(&hosts);
    config.options.max_parallel_hosts = 3;

    let (report, _) = run(backend, config).await;

    let order: Vec<&str> = report
        .dataset
        .hosts
        .iter()
        .map(|h| h.address.as_str())
        .collect();
    assert_eq!(order, hosts);
}

#[tokio::test]
async fn test_repeated_runs_are_identical_and_retained() {
    let resources = json!([{"type": "qemu", "vmid": 101, "name": "web", "status": "running"}]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.50"));
    let backend = Arc::new(
        MockBackend::default()
            .host("10.0.0.2", api)
            .rejecting_host("10.0.0.3")
            .shell(
                "10.0.0.2",
                "root",
                Shell::Engine {
                    listing: LISTING,
                    hostname: "pve",
                },
            ),
    );
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ScanOrchestrator::new(
        Arc::clone(&backend) as Arc<dyn ScanBackend>,
        Arc::clone(&sink) as Arc<dyn ResultSink>,
    );

    let mut config = config(&["10.0.0.2", "10.0.0.3"]);
    config.options.max_old_scans = 2;
    let provider = StaticConfig(config);

    let first = orchestrator.run(&provider).await.unwrap();
    let second = orchestrator.run(&provider).await.unwrap();
    let third = orchestrator.run(&provider).await.unwrap();

    assert_eq!(first.dataset, second.dataset);
    assert_eq!(second.dataset, third.dataset);
    let summary = |r: &ScanReport| -> Vec<(ScanComponent, Option<String>, String)> {
        r.errors
            .iter()
            .map(|e| (e.component, e.host_address.clone(), e.message.clone()))
            .collect()
    };
    assert_eq!(summary(&first), summary(&third));
    assert_eq!(first.counts(), third.counts());

    assert_eq!(first.run.id, RunId(1));
    assert_eq!(third.run.id, RunId(3));
    assert!(third.errors.iter().all(|e| e.scan_id == RunId(3)));
    assert!(third.run.has_errors());

    let stored: Vec<RunId> = sink.runs().iter().map(|r| r.run.id).collect();
    assert_eq!(stored, vec![RunId(2), RunId(3)]);
}

#[tokio::test]
async fn test_config_failure_aborts_before_run() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ScanOrchestrator::new(
        Arc::new(MockBackend::default()),
        Arc::clone(&sink) as Arc<dyn ResultSink>,
    );

    let err = orchestrator.run(&BrokenConfig).await.unwrap_err();

    assert!(matches!(err, CoreError::Config(_)));
    assert!(sink.runs().is_empty());
}

#[tokio::test]
async fn test_network_failure_keeps_rest_of_host() {
    let resources = json!([{"type": "qemu", "vmid": 101, "name": "web", "status": "running"}]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.50"))
        .without("/nodes/pve/network");
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine)
        .shell(
            "10.0.0.50",
            "root",
            Shell::Engine {
                listing: r#"{"id":"a1","name":"web","image":"nginx","state":"running"}"#,
                hostname: "web",
            },
        );

    let (report, backend) = run(backend, config(&["10.0.0.2"])).await;

    assert_eq!(components(&report), vec![ScanComponent::Network]);
    assert_eq!(report.errors[0].host_address.as_deref(), Some("10.0.0.2"));
    assert!(report.dataset.network.is_empty());

    assert_eq!(report.dataset.hosts.len(), 1);
    assert_eq!(report.dataset.guests.len(), 1);
    // kernel lookup and engine check on the host itself
    assert_eq!(backend.attempts_on("10.0.0.2").len(), 2);
    assert_eq!(report.dataset.workloads.len(), 1);
    assert_eq!(report.dataset.workloads[0].host_address, "10.0.0.50");
}

#[tokio::test]
async fn test_panicking_host_is_recorded_and_run_continues() {
    let backend = MockBackend::default()
        .panicking_host("10.0.0.66")
        .host("10.0.0.3", FakeApi::node("pve3", json!([])))
        .shell("10.0.0.3", "root", Shell::NoEngine);

    let (report, _) = run(backend, config(&["10.0.0.66", "10.0.0.3"])).await;

    assert_eq!(components(&report), vec![ScanComponent::HostScan]);
    assert_eq!(report.errors[0].host_address.as_deref(), Some("10.0.0.66"));
    assert!(report.errors[0].message.contains("10.0.0.66"));

    let hosts: Vec<&str> = report
        .dataset
        .hosts
        .iter()
        .map(|h| h.address.as_str())
        .collect();
    assert_eq!(hosts, vec!["10.0.0.3"]);
    assert_eq!(report.dataset.network.len(), 2);
    assert_eq!(report.counts().errors, 1);
}

#[tokio::test]
async fn test_login_sessions_are_closed_after_each_target() {
    let resources = json!([{"type": "qemu", "vmid": 101, "name": "web", "status": "running"}]);
    let api = FakeApi::node("pve", resources)
        .with("/nodes/pve/qemu/101/agent/network-get-interfaces", agent_reply("10.0.0.50"));
    let backend = MockBackend::default()
        .host("10.0.0.2", api)
        .shell("10.0.0.2", "root", Shell::NoEngine)
        .shell("10.0.0.50", "root", Shell::NoEngine);

    let mut config = config(&["10.0.0.2"]);
    config.options.scan_local_containers = true;

    let (report, backend) = run(backend, config).await;

    assert!(report.errors.is_empty());
    // one close per login candidate: root and admin
    assert_eq!(backend.closes_on("10.0.0.2"), 2);
    assert_eq!(backend.closes_on("10.0.0.50"), 2);
    assert_eq!(backend.closes_on("local"), 1);
}
