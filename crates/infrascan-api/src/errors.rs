//! Non-fatal scan error records

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::run::RunId;

/// Component that produced a scan error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanComponent {
    /// Management API authentication
    AuthError,
    /// Node topology fetch
    Topology,
    /// Cluster resource listing
    Resources,
    /// Host network interface listing
    Network,
    /// Remote shell on a hypervisor host
    RemoteExec,
    /// Container engine reachability on a host or guest
    Container,
    /// Single malformed container listing line
    ContainerParse,
    /// Hub configuration call
    HubConfig,
    /// Hub entity state call
    HubStates,
    /// Unexpected failure of a whole host scan
    HostScan,
    /// Container engine of the collecting machine
    LocalContainer,
}

impl ScanComponent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanComponent::AuthError => "AuthError",
            ScanComponent::Topology => "Topology",
            ScanComponent::Resources => "Resources",
            ScanComponent::Network => "Network",
            ScanComponent::RemoteExec => "RemoteExec",
            ScanComponent::Container => "Container",
            ScanComponent::ContainerParse => "ContainerParse",
            ScanComponent::HubConfig => "HubConfig",
            ScanComponent::HubStates => "HubStates",
            ScanComponent::HostScan => "HostScan",
            ScanComponent::LocalContainer => "LocalContainer",
        }
    }
}

impl fmt::Display for ScanComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that was logged and did not stop the run
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{component}] {message}")]
pub struct ScanError {
    pub scan_id: RunId,
    /// Address of the host, guest or hub involved, if any
    pub host_address: Option<String>,
    pub component: ScanComponent,
    pub message: String,
    /// Additional context such as the offending input line
    pub detail: Option<String>,
}

impl ScanError {
    /// Create an error without detail text
    pub fn new(
        scan_id: RunId,
        host_address: Option<String>,
        component: ScanComponent,
        message: impl Into<String>,
    ) -> Self {
        Self {
            scan_id,
            host_address,
            component,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach detail text
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_component() {
        let err = ScanError::new(
            RunId(1),
            Some("10.0.0.2".to_string()),
            ScanComponent::AuthError,
            "authentication failed for 10.0.0.2",
        );
        assert_eq!(
            err.to_string(),
            "[AuthError] authentication failed for 10.0.0.2"
        );
    }

    #[test]
    fn test_with_detail() {
        let err = ScanError::new(RunId(1), None, ScanComponent::ContainerParse, "bad line")
            .with_detail("not-json");
        assert_eq!(err.detail.as_deref(), Some("not-json"));
    }
}
