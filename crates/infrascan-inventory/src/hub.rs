//! Hub add-on inventory derived from update entities

use infrascan_api::{WorkloadRecord, WorkloadState};
use infrascan_client::{HubApi, HubEntityState};
use tracing::{info, instrument};

use crate::error::HubCollectError;

const DEFAULT_LOCATION: &str = "Home Assistant";

/// Collects add-on workloads from one hub
pub struct HubCollector<'a> {
    api: &'a dyn HubApi,
    address: &'a str,
}

impl<'a> HubCollector<'a> {
    #[must_use]
    pub fn new(api: &'a dyn HubApi, address: &'a str) -> Self {
        Self { api, address }
    }

    /// Fetch config and states and derive one workload per add-on update entity
    ///
    /// # Errors
    /// Returns `HubCollectError::Config` or `HubCollectError::States` naming the
    /// call that failed; nothing is collected from the hub in that case.
    #[instrument(skip(self), fields(hub = %self.address))]
    pub async fn collect(&self) -> Result<Vec<WorkloadRecord>, HubCollectError> {
        let config = self
            .api
            .config()
            .await
            .map_err(|source| HubCollectError::Config {
                address: self.address.to_string(),
                source,
            })?;

        let states = self
            .api
            .states()
            .await
            .map_err(|source| HubCollectError::States {
                address: self.address.to_string(),
                source,
            })?;

        let location = config
            .location_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_LOCATION);
        let host_name = format!("{location} (HAOS)");

        let workloads: Vec<WorkloadRecord> = states
            .iter()
            .filter(|entity| is_addon_update(entity))
            .map(|entity| addon_workload(entity, self.address, &host_name))
            .collect();

        info!(count = workloads.len(), "collected hub add-ons");

        Ok(workloads)
    }
}

/// Whether an entity describes an add-on or system update
///
/// Device firmware updates are excluded.
#[must_use]
pub fn is_addon_update(entity: &HubEntityState) -> bool {
    let id = entity.entity_id.as_str();
    id.starts_with("update.")
        && entity.attr_str("title").is_some_and(|t| !t.is_empty())
        && !id.contains("_firmware")
        && id.contains("_update")
}

/// Normalize an update entity into a workload record
#[must_use]
pub fn addon_workload(entity: &HubEntityState, address: &str, host_name: &str) -> WorkloadRecord {
    let id = entity.entity_id.as_str();
    let installed = entity.attr_str("installed_version").unwrap_or("?");
    // a missing key is unknown, an explicit null means nothing newer
    let latest = match entity.attributes.get("latest_version") {
        None => Some("?"),
        Some(_) => entity.attr_str("latest_version"),
    };
    let has_update = entity.state == "on";

    let state = if entity.state == "unavailable" {
        WorkloadState::Unavailable
    } else if has_update {
        WorkloadState::UpdateAvailable
    } else {
        WorkloadState::Running
    };

    let mut status = format!("v{installed}");
    if let Some(latest) = latest.filter(|l| has_update && !l.is_empty()) {
        status.push_str(&format!(" -> {latest}"));
    }

    let slug = id.strip_prefix("update.").unwrap_or(id).replace("_update", "");

    WorkloadRecord {
        host_address: address.to_string(),
        host_name: host_name.to_string(),
        workload_id: id.to_string(),
        name: entity.attr_str("title").unwrap_or_default().to_string(),
        image: format!("ha-addon/{slug}"),
        status,
        state,
        ports: String::new(),
        created_at: String::new(),
        networks: "hassio".to_string(),
        mounts: String::new(),
    }
}
