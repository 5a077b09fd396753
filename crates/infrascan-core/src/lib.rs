//! infrascan-core: scan orchestration
//!
//! Implements the `HostScanner` (one hypervisor host and everything it runs)
//! and the `ScanOrchestrator` (all hosts, hubs and the local machine, one
//! run). Persistence, configuration sources and transports are reached
//! through the `ResultSink`, `ConfigProvider` and `ScanBackend` traits.

pub mod backend;
pub mod config;
pub mod error;
pub mod error_log;
pub mod scan;
pub mod sink;
mod value;

pub use backend::ScanBackend;
pub use config::{
    ConfigProvider, HubConfig, HubProtocol, HypervisorConfig, ScanConfig, ScanOptions, Secret,
    SshCredentials, TrustPolicy,
};
pub use error::CoreError;
pub use error_log::ErrorLog;
pub use scan::host::HostScanner;
pub use scan::orchestrator::{ScanOrchestrator, ScanReport};
pub use scan::ScanContext;
pub use sink::{MemorySink, ResultSink, StoredRun};
