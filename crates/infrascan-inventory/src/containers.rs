//! Container-engine inventory over a remote shell

use infrascan_api::{WorkloadRecord, WorkloadState};
use infrascan_exec::CredentialChain;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::InventoryError;

/// Printed by the presence check when the engine binary or daemon is missing
pub const NO_ENGINE_SENTINEL: &str = "NO_DOCKER";

/// Prints the engine version, or the sentinel if the engine is unusable
pub const PRESENCE_CHECK_CMD: &str = "which docker 2>/dev/null && docker info --format '{{.ServerVersion}}' 2>/dev/null || echo 'NO_DOCKER'";

/// Lists every container as one JSON object per line
pub const LIST_CMD: &str = r#"docker ps -a --format '{"id":"{{.ID}}","name":"{{.Names}}","image":"{{.Image}}","status":"{{.Status}}","state":"{{.State}}","ports":"{{.Ports}}","created":"{{.CreatedAt}}","networks":"{{.Networks}}","mounts":"{{.Mounts}}"}' 2>/dev/null"#;

/// Display hostname of the target
pub const HOSTNAME_CMD: &str = "hostname";

/// One line of the listing command's output
#[derive(Debug, Deserialize)]
struct ListingLine {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    ports: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    networks: String,
    #[serde(default)]
    mounts: String,
}

/// Outcome of scanning one target
#[derive(Debug, Default)]
pub struct ContainerScan {
    /// Workloads that could be parsed
    pub workloads: Vec<WorkloadRecord>,
    /// Problems to be logged; never fatal
    pub issues: Vec<InventoryError>,
}

/// Enumerates container-engine workloads on one machine
pub struct ContainerInventory<'a> {
    chain: &'a CredentialChain,
}

impl<'a> ContainerInventory<'a> {
    /// Create an inventory collector over the given login chain
    #[must_use]
    pub fn new(chain: &'a CredentialChain) -> Self {
        Self { chain }
    }

    /// Collect workloads from the target
    ///
    /// A target without a usable engine yields an empty scan with no issues.
    #[instrument(skip(self), fields(target = %self.chain.target()))]
    pub async fn collect(&self) -> ContainerScan {
        let mut scan = ContainerScan::default();
        let target = self.chain.target();

        let presence = match self.chain.run(PRESENCE_CHECK_CMD).await {
            Ok(output) => output,
            Err(e) => {
                scan.issues.push(e.into());
                return scan;
            }
        };
        if presence.is_empty() || presence.contains(NO_ENGINE_SENTINEL) {
            debug!("no container engine on target");
            return scan;
        }

        let listing = match self.chain.run(LIST_CMD).await {
            Ok(output) => output,
            Err(e) => {
                scan.issues.push(e.into());
                return scan;
            }
        };
        if listing.is_empty() {
            return scan;
        }

        let host_name = match self.chain.run(HOSTNAME_CMD).await {
            Ok(name) if !name.is_empty() => name,
            Ok(_) => target.to_string(),
            Err(e) => {
                scan.issues.push(e.into());
                target.to_string()
            }
        };

        let (workloads, malformed) = parse_listing(&listing, target, &host_name);
        scan.workloads = workloads;
        scan.issues.extend(malformed);

        info!(
            workloads = scan.workloads.len(),
            host_name = %host_name,
            "collected container workloads"
        );

        scan
    }
}

/// Parse listing output, one JSON object per line
///
/// Each line is parsed on its own; malformed lines are returned as
/// `InventoryError::MalformedLine` and do not affect their neighbours.
pub fn parse_listing(
    output: &str,
    host_address: &str,
    host_name: &str,
) -> (Vec<WorkloadRecord>, Vec<InventoryError>) {
    let mut workloads = Vec::new();
    let mut malformed = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<ListingLine>(line) {
            Ok(row) => workloads.push(WorkloadRecord {
                host_address: host_address.to_string(),
                host_name: host_name.to_string(),
                workload_id: row.id,
                name: row.name,
                image: row.image,
                status: row.status,
                state: WorkloadState::from(row.state),
                ports: row.ports,
                created_at: row.created,
                networks: row.networks,
                mounts: row.mounts,
            }),
            Err(e) => malformed.push(InventoryError::MalformedLine {
                host: host_address.to_string(),
                line: line.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    (workloads, malformed)
}
