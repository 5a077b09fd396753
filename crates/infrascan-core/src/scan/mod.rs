//! Host and run level scanning

pub mod host;
pub mod orchestrator;

use std::sync::Arc;

use infrascan_api::{ScanComponent, WorkloadRecord};
use infrascan_exec::{ConnectionInfo, CredentialChain};
use infrascan_inventory::{ContainerInventory, InventoryError};

use crate::backend::ScanBackend;
use crate::config::ScanConfig;
use crate::error_log::ErrorLog;

/// Shared state of one run, cheap to clone into host tasks
#[derive(Clone)]
pub struct ScanContext {
    pub backend: Arc<dyn ScanBackend>,
    pub config: Arc<ScanConfig>,
    pub log: Arc<ErrorLog>,
}

impl ScanContext {
    #[must_use]
    pub fn new(backend: Arc<dyn ScanBackend>, config: Arc<ScanConfig>, log: Arc<ErrorLog>) -> Self {
        Self {
            backend,
            config,
            log,
        }
    }

    /// Login chain over the configured shell credentials for `target`
    #[must_use]
    pub fn login_chain(&self, target: &str) -> CredentialChain {
        let ssh = &self.config.ssh;
        let trust = self.config.options.trust;
        ssh.usernames()
            .into_iter()
            .fold(CredentialChain::new(target, ssh.timeout()), |chain, user| {
                let conn = ConnectionInfo::new(target, user, ssh.password.expose())
                    .with_port(ssh.port);
                chain.with_candidate(user, self.backend.remote_executor(conn, trust))
            })
    }

    /// Run a container inventory and log its issues
    ///
    /// Reachability problems are logged under `component`, malformed listing
    /// lines under `ContainerParse` with the line as detail.
    pub async fn collect_workloads(
        &self,
        chain: &CredentialChain,
        component: ScanComponent,
    ) -> Vec<WorkloadRecord> {
        let scan = ContainerInventory::new(chain).collect().await;
        let target = chain.target();
        for issue in &scan.issues {
            match issue {
                InventoryError::Unreachable(e) => {
                    self.log.record(Some(target), component, e.to_string());
                }
                InventoryError::MalformedLine { line, .. } => self.log.record_with_detail(
                    Some(target),
                    ScanComponent::ContainerParse,
                    issue.to_string(),
                    line.clone(),
                ),
            }
        }
        scan.workloads
    }
}
